//! Key-value persistence for the session token set.
//!
//! The session manager stores its four keys through the `KeyValueStore`
//! trait. Backends:
//! - `FileStore`: a single JSON file, written atomically
//! - `KeychainStore`: one OS keychain entry per key
//! - `MemoryStore`: process-local map for tests and throwaway sessions

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("Corrupt value for key '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Durable string-to-string storage.
///
/// Implementations must be safe to share between tasks. `multi_set` should be
/// atomic where the backend allows it; the default implementation is not.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn multi_set(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Remove every key, continuing past failures and reporting the first one.
    fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut first_error = None;
        for key in keys {
            if let Err(e) = self.remove(key) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
