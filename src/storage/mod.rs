//! Key/value persistence in two tiers.
//!
//! The long-lived tier survives restarts (a JSON file, or the OS keyring for
//! credentials). The session tier lives only as long as the process. Values
//! are plain strings, the same contract browser storage offers.

mod file;
mod keyring_store;
mod memory;

pub use file::FileStorage;
pub use keyring_store::KeyringStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keyring unavailable: {0}")]
    Keyring(#[from] keyring::Error),
}

pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Local,
    Session,
}

impl StorageTier {
    pub fn for_remember(remember: bool) -> Self {
        if remember {
            StorageTier::Local
        } else {
            StorageTier::Session
        }
    }

    pub fn other(self) -> Self {
        match self {
            StorageTier::Local => StorageTier::Session,
            StorageTier::Session => StorageTier::Local,
        }
    }
}

#[derive(Clone)]
pub struct StorageTiers {
    local: Arc<dyn KeyValueStorage>,
    session: Arc<dyn KeyValueStorage>,
}

impl StorageTiers {
    pub fn new(local: Arc<dyn KeyValueStorage>, session: Arc<dyn KeyValueStorage>) -> Self {
        Self { local, session }
    }

    pub fn tier(&self, tier: StorageTier) -> &dyn KeyValueStorage {
        match tier {
            StorageTier::Local => self.local.as_ref(),
            StorageTier::Session => self.session.as_ref(),
        }
    }

    /// Reads `key` from the local tier first, then the session tier. Read
    /// failures and blank values count as absent.
    pub fn find(&self, key: &str) -> Option<(StorageTier, String)> {
        [StorageTier::Local, StorageTier::Session]
            .into_iter()
            .find_map(|tier| {
                read_soft(self.tier(tier), key)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| (tier, value))
            })
    }

    pub fn read(&self, tier: StorageTier, key: &str) -> Option<String> {
        read_soft(self.tier(tier), key)
    }

    pub fn write_exclusive(&self, tier: StorageTier, key: &str, value: &str) {
        if let Err(err) = self.tier(tier).set(key, value) {
            tracing::warn!(key, ?tier, error = %err, "failed to persist value");
        }
        if let Err(err) = self.tier(tier.other()).remove(key) {
            tracing::warn!(key, tier = ?tier.other(), error = %err, "failed to clear stale value");
        }
    }

    pub fn clear_everywhere(&self, key: &str) {
        for tier in [StorageTier::Local, StorageTier::Session] {
            if let Err(err) = self.tier(tier).remove(key) {
                tracing::warn!(key, ?tier, error = %err, "failed to clear value");
            }
        }
    }
}

pub(crate) fn read_soft(storage: &dyn KeyValueStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(key, error = %err, "storage read failed; treating as absent");
            None
        }
    }
}
