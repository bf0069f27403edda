pub mod classify;
pub mod config;
pub mod error;
pub mod telemetry;
