use super::SnapshotStore;
use crate::error::{FolioError, Result};
use sled::Db;
use std::path::{Path, PathBuf};

/// Durable snapshot store backed by an embedded `sled` database
///
/// sled holds an exclusive lock on its directory, so only one process can
/// have the history open at a time. Every write is flushed before returning.
pub struct SledStore {
    db: Db,
    path: PathBuf,
}

impl SledStore {
    /// Open or create a store at `path`
    ///
    /// The parent directory is created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::Storage` if the database cannot be opened, which
    /// includes the case where another process already holds it.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_chat::storage::{SledStore, SnapshotStore};
    ///
    /// # fn main() -> folio_chat::error::Result<()> {
    /// let dir = tempfile::tempdir()?;
    /// let store = SledStore::open(dir.path().join("history.sled"))?;
    /// store.write("k", "v")?;
    /// assert_eq!(store.read("k")?.as_deref(), Some("v"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FolioError::Storage(format!(
                    "Failed to create parent directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(&path)
            .map_err(|e| FolioError::Storage(format!("Failed to open database: {}", e)))?;

        tracing::debug!(path = %path.display(), "Opened sled snapshot store");
        Ok(Self { db, path })
    }

    /// Location of the database directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for SledStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| FolioError::Storage(format!("Failed to read snapshot: {}", e)))?;

        match value {
            Some(bytes) => {
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    FolioError::Storage(format!("Snapshot is not valid UTF-8: {}", e))
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| FolioError::Storage(format!("Failed to write snapshot: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| FolioError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| FolioError::Storage(format!("Failed to remove snapshot: {}", e)))?;
        self.db
            .flush()
            .map_err(|e| FolioError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}
