//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the identity provider API key and endpoints, the last email used to sign
//! in, and where the session is persisted.
//!
//! Configuration is stored at `~/.config/chartlens/config.json`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::IdentityClient;
use crate::storage::{FileStore, KeyValueStore, KeychainStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "chartlens";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides the configured API key
pub const API_KEY_ENV: &str = "CHARTLENS_FIREBASE_API_KEY";

/// Where the session token set is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keychain,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub identity_base_url: Option<String>,
    pub token_base_url: Option<String>,
    pub last_email: Option<String>,
    #[serde(default)]
    pub session_backend: SessionBackend,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// API key from the environment, falling back to the config file
    pub fn api_key(&self) -> Option<String> {
        Self::resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    fn resolve_api_key(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
        from_env
            .filter(|key| !key.trim().is_empty())
            .or_else(|| from_file.filter(|key| !key.trim().is_empty()).map(str::to_string))
    }

    /// Build the identity client described by this config
    pub fn identity_client(&self) -> Result<IdentityClient> {
        let api_key = self.api_key().ok_or_else(|| {
            anyhow::anyhow!("No API key configured. Set {} or api_key in the config file.", API_KEY_ENV)
        })?;
        let mut client = IdentityClient::new(api_key).context("Failed to build HTTP client")?;
        if self.identity_base_url.is_some() || self.token_base_url.is_some() {
            let identity = self
                .identity_base_url
                .as_deref()
                .unwrap_or(crate::api::client::IDENTITY_BASE_URL);
            let token = self
                .token_base_url
                .as_deref()
                .unwrap_or(crate::api::client::SECURE_TOKEN_BASE_URL);
            debug!(identity, token, "Using custom identity endpoints");
            client = client.with_base_urls(identity, token);
        }
        Ok(client)
    }

    /// Open the configured session store
    pub fn session_store(&self) -> Result<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = match self.session_backend {
            SessionBackend::File => {
                let dir = self.data_dir()?;
                let store = FileStore::new(&dir)
                    .with_context(|| format!("Failed to open session store in {}", dir.display()))?;
                Arc::new(store)
            }
            SessionBackend::Keychain => Arc::new(KeychainStore::new()),
        };
        Ok(store)
    }
}
