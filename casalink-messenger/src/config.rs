//! Messenger Configuration
//!
//! Configuration for the terminal messaging client: backend coordinates,
//! credentials, and sync timing.

use anyhow::{Context, Result};
use casalink_messaging::SyncConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Messenger configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backend connection
    #[serde(default)]
    pub server: ServerConfig,

    /// Sync timing
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend base URL
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Bearer token for the authenticated user
    #[serde(default)]
    pub token: Option<String>,

    /// The authenticated user's id
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_server_url() -> String {
    "https://api.casalink.example".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            token: None,
            user_id: None,
        }
    }
}

impl Config {
    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("casalink")
            .join("messenger.toml")
    }

    /// Load configuration from file, creating a default one if not found.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, contents).context("Failed to write config file")?;

        Ok(())
    }
}
