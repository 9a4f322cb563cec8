//! JSON file persistence for the watchlist document
//!
//! The document is read fresh at the start of every operation and written
//! back whole. A missing file is not an error: it yields an empty store at
//! the current schema version. Migrations run on every load, and saves
//! always carry the post-migration version, so a store is never migrated
//! twice.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::WatchlistStore;
use crate::error::Result;

/// Handle to the persisted watchlist document
#[derive(Debug, Clone)]
pub struct WatchlistFile {
    path: PathBuf,
}

impl WatchlistFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and migrate the store. Only "file does not exist" is
    /// recoverable; any other IO or decode failure propagates.
    pub async fn load(&self) -> Result<WatchlistStore> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no watchlist file yet, starting empty");
                return Ok(WatchlistStore::empty());
            }
            Err(err) => return Err(err.into()),
        };

        let mut store: WatchlistStore = serde_json::from_slice(&raw)?;
        store.migrate()?;
        Ok(store)
    }

    /// Write the whole document, pretty-printed
    pub async fn save(&self, store: &WatchlistStore) -> Result<()> {
        let data = serde_json::to_vec_pretty(store)?;
        tokio::fs::write(&self.path, data).await?;
        debug!(
            path = %self.path.display(),
            groups = store.groups.len(),
            "watchlist saved"
        );
        Ok(())
    }
}
