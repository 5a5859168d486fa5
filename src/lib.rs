pub mod actuators;
pub mod api;
pub mod channels;
pub mod config;
pub mod errors;
pub mod levels;
pub mod models;
pub mod reading_history;
pub mod sensors;
pub mod settings;
pub mod store;
pub mod subscriptions;
pub mod units;
