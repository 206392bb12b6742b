//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::limits::LimitsConfig;
use super::listen::{HttpConfig, ListenConfig, TlsConfig};
use super::session::SessionConfig;
use super::users::UserBlock;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// WebSocket listen configuration.
    pub listen: ListenConfig,
    /// Optional secure WebSocket (wss) listen configuration.
    pub tls: Option<TlsConfig>,
    /// Optional HTTP API listener (REST endpoints and `/metrics`).
    pub http: Option<HttpConfig>,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session lifecycle policy.
    #[serde(default)]
    pub session: SessionConfig,
    /// Frame and flood limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Users upserted into the directory at startup.
    #[serde(default, rename = "user")]
    pub users: Vec<UserBlock>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, used in logs (e.g., "cipher.local").
    pub name: String,
    /// Whether Prometheus metrics are collected (default: true).
    #[serde(default = "default_true")]
    pub metrics: bool,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "storage/cipher.db".to_string()
}

pub(super) fn default_true() -> bool {
    true
}
