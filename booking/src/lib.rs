pub mod cli;
pub mod config;
pub mod db;
pub mod directory;
pub mod engine;
pub mod payment;
pub mod requests;
pub mod session;

pub mod error;
pub mod time;
