pub mod api;
pub mod clock;
pub mod config;
pub mod domain;
#[cfg(feature = "modbus")]
pub mod hardware;
pub mod meter;
pub mod persistence;
pub mod telemetry;
