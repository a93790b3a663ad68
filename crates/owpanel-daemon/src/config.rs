//! Configuration loading

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub hub: HubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the panel web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

/// Vera hub `data_request` endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Scheme, host and port of the hub
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the data request handler
    #[serde(default = "default_path")]
    pub path: String,
    /// Handler id the OWServer plugin registered with the hub
    #[serde(default = "default_plugin_id")]
    pub plugin_id: String,
    /// Request timeout in seconds (unset waits indefinitely)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path: default_path(),
            plugin_id: default_plugin_id(),
            timeout_secs: None,
        }
    }
}

impl HubConfig {
    /// Full URL of the data request handler
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3480".to_string()
}

fn default_path() -> String {
    "/data_request".to_string()
}

fn default_plugin_id() -> String {
    "lr_owCtrl".to_string()
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}
