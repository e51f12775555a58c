pub mod config;
pub mod db;
pub mod state;
pub mod store;
pub mod zoho;
