//! On-disk store backed by an embedded `sled` database

use super::PersistentStore;
use crate::error::{DocchatError, Result};
use sled::Db;
use std::path::Path;

/// Durable [`PersistentStore`] using `sled`
///
/// Every write is flushed before returning so that a crash right after a
/// message is appended does not lose it.
pub struct SledStore {
    db: Db,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns `DocchatError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use docchat::storage::{PersistentStore, SledStore};
    ///
    /// # fn main() -> docchat::error::Result<()> {
    /// let dir = std::env::temp_dir().join("docchat-doc-example.sled");
    /// let store = SledStore::open(&dir)?;
    /// store.set("greeting", "hello");
    /// assert_eq!(store.get("greeting").as_deref(), Some("hello"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DocchatError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let db = sled::open(path)
            .map_err(|e| DocchatError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    fn flush(&self, op: &str, key: &str) -> bool {
        match self.db.flush() {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Flush after {} of {} failed: {}", op, key, e);
                false
            }
        }
    }
}

impl PersistentStore for SledStore {
    fn get(&self, key: &str) -> Option<String> {
        let bytes = match self.db.get(key.as_bytes()) {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("Read of {} failed: {}", key, e);
                return None;
            }
        };

        match String::from_utf8(bytes.to_vec()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Stored value for {} is not valid UTF-8, ignoring", key);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if let Err(e) = self.db.insert(key.as_bytes(), value.as_bytes()) {
            tracing::warn!("Write of {} failed: {}", key, e);
            return false;
        }
        self.flush("write", key)
    }

    fn remove(&self, key: &str) -> bool {
        if let Err(e) = self.db.remove(key.as_bytes()) {
            tracing::warn!("Removal of {} failed: {}", key, e);
            return false;
        }
        self.flush("removal", key)
    }
}
