//! Application configuration, read from `config.toml` in the data directory.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::SyncSettings;

pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding `client_id`
pub const CLIENT_ID_ENV: &str = "CORNELL_CLIENT_ID";

/// Placeholder shipped in sample configs; treated as unset
pub const CLIENT_ID_PLACEHOLDER: &str = "YOUR_GOOGLE_CLIENT_ID";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// OAuth client id registered with Google
    pub client_id: String,
    /// Optional client secret (installed-app clients are issued one)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Loopback port for the consent redirect; 0 picks a free port
    pub redirect_port: u16,
    pub sync: SyncSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_port: 0,
            sync: SyncSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load `config.toml` from `data_dir`. A missing file yields defaults.
    /// `CORNELL_CLIENT_ID` overrides the configured client id.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            log::debug!("No config file at {:?}, using defaults", path);
            Self::default()
        };

        if let Ok(client_id) = std::env::var(CLIENT_ID_ENV) {
            if !client_id.trim().is_empty() {
                config.client_id = client_id.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Whether a usable OAuth client id is configured
    pub fn has_client_id(&self) -> bool {
        let id = self.client_id.trim();
        !id.is_empty() && !id.starts_with(CLIENT_ID_PLACEHOLDER)
    }
}
