//! In-process store for ephemeral sessions and tests

use super::PersistentStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local [`PersistentStore`]
///
/// Nothing written here survives a restart. `with_failing_writes` builds a
/// store whose writes are always rejected, which is how a disabled or full
/// browser storage behaves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing_writes: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects every `set`
    pub fn with_failing_writes() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            failing_writes: true,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if self.failing_writes {
            tracing::warn!("Memory store rejected write for key {}", key);
            return false;
        }

        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value.to_string());
                true
            }
            Err(_) => {
                tracing::warn!("Memory store lock poisoned, dropping write for {}", key);
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.remove(key);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_then_get() {
        let store = MemoryStore::new();
        assert!(store.set("a", "1"));
        assert!(store.set("a", "2"));
        assert_eq!(store.get("a").as_deref(), Some("2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = MemoryStore::new();
        store.set("a", "1");
        assert!(store.remove("a"));
        assert!(store.remove("a"));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_failing_writes_store_nothing() {
        let store = MemoryStore::with_failing_writes();
        assert!(!store.set("a", "1"));
        assert!(store.get("a").is_none());
    }
}
