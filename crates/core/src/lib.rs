pub mod config;
pub mod logs;
pub mod models;
pub mod truncate;
pub mod util;
