//! Client configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the API base URL, the credential storage medium and the refresh
//! schedule.
//!
//! Configuration is stored at `~/.config/parlor/config.json`. Environment
//! variables take precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "parlor";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend address when neither the file nor the environment set one.
pub const DEFAULT_API_URL: &str = "http://localhost:14000";

/// Overrides `api_url`.
pub const ENV_API_URL: &str = "PARLOR_API_URL";

/// Overrides `credential_store` (`keyring`, `file` or `memory`).
pub const ENV_CREDENTIAL_STORE: &str = "PARLOR_CREDENTIAL_STORE";

/// Lower bound for `refresh_interval_secs`; a zero period is not a schedule.
const MIN_REFRESH_INTERVAL_SECS: u64 = 1;

/// Which medium persists the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// OS keychain, survives restarts with no expiry of its own.
    #[default]
    Keyring,
    /// JSON file in the cache directory with a cookie-style expiry.
    File,
    /// Process memory only.
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(StoreKind::Keyring),
            "file" | "cookie" => Ok(StoreKind::File),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow::anyhow!("Unknown credential store: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub credential_store: StoreKind,
    /// Advisory lifetime of a file-stored token. The token's own `exp` wins.
    pub cookie_ttl_days: u32,
    pub refresh_interval_secs: u64,
    /// Refresh once the token is this close to expiring.
    pub refresh_buffer_secs: i64,
    pub request_timeout_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credential_store: StoreKind::default(),
            cookie_ttl_days: 7,
            refresh_interval_secs: 60,
            refresh_buffer_secs: 300,
            request_timeout_secs: 30,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from disk (if present) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(kind) = std::env::var(ENV_CREDENTIAL_STORE) {
            match kind.parse() {
                Ok(kind) => self.credential_store = kind,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_CREDENTIAL_STORE),
            }
        }
    }

    /// Period of the background refresh check, never shorter than a second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_secs.max(0))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
