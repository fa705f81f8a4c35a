pub mod aggregate;
pub mod collector;
pub mod config;
pub mod cost;
pub mod dashboard;
pub mod formatter;
pub mod models;
pub mod notify;
pub mod process;
pub mod providers;
pub mod report;
pub mod store;
