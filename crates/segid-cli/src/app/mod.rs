pub mod config;
pub mod load;
pub mod store;
pub mod telemetry;
