use super::SnapshotStore;
use crate::error::{FolioError, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory snapshot store
///
/// Nothing survives the process. Used as the test fake for the persistence
/// port and as the degraded backend when the durable store is unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a raw value under `key`
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::storage::{MemoryStore, SnapshotStore};
    ///
    /// let store = MemoryStore::with_entry("k", "not json");
    /// assert_eq!(store.read("k").unwrap().as_deref(), Some("not json"));
    /// ```
    pub fn with_entry(key: impl Into<String>, value: impl Into<String>) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.write() {
            entries.insert(key.into(), value.into());
        }
        store
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| FolioError::Storage("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| FolioError::Storage("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| FolioError::Storage("memory store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
