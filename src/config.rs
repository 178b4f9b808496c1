use crate::co2::climatiq::{DEFAULT_BASE_URL, DEFAULT_DATA_VERSION};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Co2Config {
    pub api_key: String,
    pub base_url: String,
    pub data_version: String,
}

impl Default for Co2Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_version: DEFAULT_DATA_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    /// Page loaded on startup; empty waits for the first NAVIGATE.
    pub start_url: String,
    pub navigation_poll_ms: u64,
    pub user_agent: String,
    pub fetch_timeout_seconds: u64,
    pub co2: Co2Config,
    pub telegram: Option<TelegramConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "pricewatch.db".to_string(),
            start_url: String::new(),
            navigation_poll_ms: 1000,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) PriceWatch/0.1".to_string(),
            fetch_timeout_seconds: 15,
            co2: Co2Config::default(),
            telegram: None,
        }
    }
}

/// Reads the JSON config; a missing file yields the defaults.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    if !Path::new(path).exists() {
        warn!("⚠️ Config {} not found, using defaults", path);
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}
