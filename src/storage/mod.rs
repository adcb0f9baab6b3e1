//! Snapshot persistence port
//!
//! Conversation history is persisted as a single keyed snapshot. The
//! [`SnapshotStore`] trait is the port the conversation store writes
//! through; [`SledStore`] is the durable embedded backend and
//! [`MemoryStore`] is an in-process fake used by tests and as a fallback
//! when the durable store cannot be opened.

use crate::error::{FolioError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Environment variable that overrides the history database location
pub const HISTORY_DB_ENV: &str = "FOLIO_HISTORY_DB";

/// Keyed snapshot storage
///
/// Each `write` replaces the whole value stored under `key`. Implementations
/// must complete the write before returning so callers observe a durable
/// snapshot no older than their latest mutation.
pub trait SnapshotStore: Send + Sync {
    /// Read the snapshot stored under `key`, if any
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the snapshot stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the snapshot stored under `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Resolve the history database directory
///
/// Honors the `FOLIO_HISTORY_DB` environment variable first, then falls
/// back to the platform data directory (for example
/// `~/.local/share/folio-chat/history.sled` on Linux).
///
/// # Errors
///
/// Returns `FolioError::Storage` if no data directory can be determined
pub fn default_storage_path() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var(HISTORY_DB_ENV) {
        if !override_path.trim().is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }

    let proj_dirs = ProjectDirs::from("dev", "folio", "folio-chat")
        .ok_or_else(|| FolioError::Storage("Could not determine data directory".into()))?;

    Ok(proj_dirs.data_dir().join("history.sled"))
}
