pub mod model;
pub mod repository_sqlx;
pub mod transition;
