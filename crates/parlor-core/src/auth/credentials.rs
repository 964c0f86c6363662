//! Persistence for the single access token.
//!
//! Three interchangeable media sit behind `CredentialStore`. None of them
//! report errors to the caller: a token that cannot be read is simply absent,
//! and write failures are logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, StoreKind, APP_NAME};

/// Key under which the token is stored in every medium.
pub const TOKEN_KEY: &str = "access_token";

/// Cookie-style lifetime used when the caller does not pick one.
pub const DEFAULT_TTL_DAYS: u32 = 7;

pub trait CredentialStore: Send + Sync {
    /// Store `value`, replacing any previous token. `ttl_days` is advisory.
    fn save(&self, value: &str, ttl_days: Option<u32>);

    fn load(&self) -> Option<String>;

    fn clear(&self);
}

/// Open the medium selected in `config`.
pub fn open_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.credential_store {
        StoreKind::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
        StoreKind::File => {
            let dir = config.cache_dir().context("Failed to resolve token directory")?;
            Arc::new(FileStore::new(dir).with_default_ttl(config.cookie_ttl_days))
        }
        StoreKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

// ============================================================================
// Keyring
// ============================================================================

/// OS keychain entry. Survives restarts; TTL is ignored.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Option<Entry> {
        match Entry::new(&self.service, TOKEN_KEY) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Failed to create keyring entry");
                None
            }
        }
    }
}

impl CredentialStore for KeyringStore {
    fn save(&self, value: &str, _ttl_days: Option<u32>) {
        if let Some(entry) = self.entry() {
            if let Err(e) = entry.set_password(value) {
                warn!(error = %e, "Failed to store token in keychain");
            }
        }
    }

    fn load(&self) -> Option<String> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to retrieve token from keychain");
                None
            }
        }
    }

    fn clear(&self) {
        if let Some(entry) = self.entry() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => warn!(error = %e, "Failed to delete token from keychain"),
            }
        }
    }
}

// ============================================================================
// File (cookie-like)
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// JSON file with an expiry date, mimicking a browser cookie.
pub struct FileStore {
    dir: PathBuf,
    default_ttl_days: u32,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            default_ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    pub fn with_default_ttl(mut self, days: u32) -> Self {
        self.default_ttl_days = days;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", TOKEN_KEY))
    }

    fn write(&self, path: &Path, stored: &StoredToken) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(stored)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn read(path: &Path) -> Result<StoredToken> {
        let contents = std::fs::read_to_string(path).context("Failed to read token file")?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }
}

impl CredentialStore for FileStore {
    fn save(&self, value: &str, ttl_days: Option<u32>) {
        let days = ttl_days.unwrap_or(self.default_ttl_days);
        let stored = StoredToken {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::days(i64::from(days)),
        };
        if let Err(e) = self.write(&self.path(), &stored) {
            warn!(error = %e, "Failed to save token file");
        }
    }

    fn load(&self) -> Option<String> {
        let path = self.path();
        if !path.exists() {
            return None;
        }
        match Self::read(&path) {
            Ok(stored) if stored.expires_at > Utc::now() => Some(stored.value),
            Ok(_) => {
                debug!("Stored token file expired");
                self.clear();
                None
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable token file");
                self.clear();
                None
            }
        }
    }

    fn clear(&self) {
        let path = self.path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(error = %e, "Failed to delete token file");
            }
        }
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn save(&self, value: &str, _ttl_days: Option<u32>) {
        *self.value.lock() = Some(value.to_string());
    }

    fn load(&self) -> Option<String> {
        self.value.lock().clone()
    }

    fn clear(&self) {
        *self.value.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load(), None);
        store.save("abc", None);
        assert_eq!(store.load().as_deref(), Some("abc"));
        store.clear();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.load(), None);

        store.save("a.b.c", Some(1));
        assert_eq!(store.load().as_deref(), Some("a.b.c"));
        assert!(store.path().exists());

        store.clear();
        assert_eq!(store.load(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_expired_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        store.save("a.b.c", Some(0));
        assert_eq!(store.load(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_corrupt_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_clear_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path().to_path_buf()).clear();
        MemoryStore::new().clear();
    }
}
