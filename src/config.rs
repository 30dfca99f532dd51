use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub meter: MeterConfig,
    pub storage: StorageConfig,
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
    pub sample_interval_ms: u64,
    pub smoothing_window: usize,
    pub save_interval_secs: u64,
}

impl MeterConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

/// Modbus gateway the power monitor sits behind (used with the `modbus`
/// feature; ignored by the simulated sensor).
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub addr: String,
    pub unit_id: u8,
    pub timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("OEM__").split("__"));
        Ok(figment.extract()?)
    }
}
