//! Interactive inference service configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable that overrides the configuration file path
pub const CONFIG_ENV: &str = "INTERACT_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub checkpoints: CheckpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub body_limit_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub device: String,
}

/// Checkpoints loaded when each handle is initialized
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    pub network: PathBuf,
    /// Absent means the stroke controller runs without a network
    pub s2m: Option<PathBuf>,
    pub fbrs: PathBuf,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> String {
        std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.toml".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                body_limit_mb: 200,
            },
            inference: InferenceConfig {
                device: "CPU".to_string(),
            },
            checkpoints: CheckpointConfig {
                network: PathBuf::from("saves/XMem.xml"),
                s2m: Some(PathBuf::from("saves/s2m.xml")),
                fbrs: PathBuf::from("saves/fbrs.xml"),
            },
        }
    }
}
