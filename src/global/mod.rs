pub mod config;
pub mod database;
pub mod error;
pub mod housekeeping;
pub mod logging;
