pub mod aging;
pub mod models;
