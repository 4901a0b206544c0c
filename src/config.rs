use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::engine::close::DEFAULT_ENTRY_OFFSET_POINTS;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_entry_offset")]
    pub entry_offset_points: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_offset_points: DEFAULT_ENTRY_OFFSET_POINTS,
        }
    }
}

fn default_entry_offset() -> f64 {
    DEFAULT_ENTRY_OFFSET_POINTS
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;

        if let Ok(bind) = std::env::var("INTRABAR_BIND_ADDR") {
            config.server.bind_addr = bind;
        }

        Ok(config)
    }
}
