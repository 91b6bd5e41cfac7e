pub mod model;
pub mod repository_sqlx;
