//! JSON flat-file store.
//!
//! The whole database is one [`Document`] serialized to a single file.
//! Mutations run under an exclusive lock for the full
//! read-modify-write-persist sequence, so concurrent requests serialize per
//! document and no update is lost. Saves go through a temp file + rename so
//! a crash mid-write cannot truncate the document.

use crate::models::Document;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The persisted document plus its on-disk location.
pub struct Store {
    path: PathBuf,
    doc: RwLock<Document>,
}

impl Store {
    /// Open the store at `path`, loading the existing document or starting
    /// from six empty collections when the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No data file found, starting empty");
                Document::default()
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        info!(
            path = %path.display(),
            users = doc.users.len(),
            posts = doc.posts.len(),
            "Opened data store"
        );

        Ok(Self {
            path,
            doc: RwLock::new(doc),
        })
    }

    /// Run a read-only closure against the document.
    pub async fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> T {
        let doc = self.doc.read().await;
        f(&doc)
    }

    /// Run a fallible mutation against the document.
    ///
    /// The exclusive lock is held across validation, mutation and persist.
    /// When the closure returns `Err` nothing is written; when it returns
    /// `Ok` the whole document is saved before the lock is released.
    pub async fn try_update<T, E>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut doc = self.doc.write().await;
        let value = f(&mut doc)?;
        save(&self.path, &doc).await?;
        Ok(value)
    }
}

/// Serialize the document and atomically replace the file on disk.
async fn save(path: &Path, doc: &Document) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "Saved document");
    Ok(())
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("data file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}
