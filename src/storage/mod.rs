//! Local persistence for conversation state
//!
//! A [`PersistentStore`] is a best-effort key/value store that survives
//! process restarts. Writes report success as a `bool` and never surface an
//! error to the caller; reads that fail for any reason look like a missing
//! key. Callers must therefore treat the store as advisory: the in-memory
//! state is authoritative for the running process.

use crate::config::StorageConfig;
use crate::error::{DocchatError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Key holding the raw session id string
pub const SESSION_ID_KEY: &str = "textbook-chat-session-id";

/// Key holding the JSON array of persisted messages
pub const MESSAGES_KEY: &str = "textbook-chat-messages";

/// Best-effort key/value storage
///
/// There is no atomicity across keys. Implementations log failures with
/// `tracing` instead of returning them.
pub trait PersistentStore: Send + Sync {
    /// Read a value; `None` if absent or unreadable
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value; returns `false` if the write did not happen
    fn set(&self, key: &str, value: &str) -> bool;

    /// Delete a key; returns `false` if the removal failed
    fn remove(&self, key: &str) -> bool;
}

impl<T: PersistentStore + ?Sized> PersistentStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> bool {
        (**self).remove(key)
    }
}

impl<T: PersistentStore + ?Sized> PersistentStore for Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> bool {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> bool {
        (**self).remove(key)
    }
}

/// Default location of the on-disk store
///
/// # Errors
///
/// Returns `DocchatError::Storage` if the platform data directory cannot be
/// determined
pub fn default_store_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "docchat", "docchat")
        .ok_or_else(|| DocchatError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("chat.sled"))
}

/// Open the store described by the configuration
///
/// # Errors
///
/// Returns `DocchatError::Storage` if the on-disk store cannot be opened
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn PersistentStore>> {
    if config.ephemeral {
        tracing::info!("Using ephemeral in-memory storage");
        return Ok(Box::new(MemoryStore::new()));
    }

    let path = match &config.path {
        Some(path) => path.clone(),
        None => default_store_path()?,
    };

    tracing::debug!("Opening chat store at {}", path.display());
    Ok(Box::new(SledStore::open(path)?))
}
