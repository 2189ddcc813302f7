//! Atomic file-tier document store.
//!
//! One JSON document per entity per file, named `{id}.json` under a per-kind
//! directory. Writes go to a `.tmp` sibling first and are renamed into place,
//! so a reader never observes a partially written document. Unparsable
//! documents are quarantined to a `.corrupted` sibling on first read and
//! reported as not-found — a corrupted cache entry must not be fatal to the
//! caller.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use stellium_core::enums::EntityKind;

use crate::error::StoreError;

/// Filesystem-backed JSON document store, one subdirectory per entity kind.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of the file tier.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    fn doc_path(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{id}.json"))
    }

    /// Write a document atomically: serialize, write to `{id}.json.tmp`,
    /// fsync, then rename to `{id}.json`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the document cannot be
    /// serialized, or `StoreError::Io` on filesystem failure.
    pub async fn put<T: Serialize>(
        &self,
        kind: EntityKind,
        id: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;

        fs::create_dir_all(self.kind_dir(kind)).await?;
        let final_path = self.doc_path(kind, id);
        let tmp_path = final_path.with_extension("json.tmp");

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    /// Read a document. A missing file is `Ok(None)`; an unparsable file is
    /// quarantined to `{id}.json.corrupted` and also reported as `Ok(None)`,
    /// so the directory self-heals.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` only for filesystem failures other than
    /// not-found.
    pub async fn get<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.doc_path(kind, id);
        read_document(&path).await
    }

    /// Whether a document file exists for this ID.
    pub async fn contains(&self, kind: EntityKind, id: &str) -> bool {
        fs::try_exists(self.doc_path(kind, id)).await.unwrap_or(false)
    }

    /// Delete a document. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` for filesystem failures other than not-found.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.doc_path(kind, id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List documents of a kind, sliced by `offset`/`limit`.
    ///
    /// Order is filesystem enumeration order — not stable across mutations;
    /// callers must not assume otherwise. Unparsable entries in the slice are
    /// quarantined and skipped, so a page may come back shorter than `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` for filesystem failures other than a missing
    /// kind directory (which lists empty).
    pub async fn list<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<T>, StoreError> {
        let dir = self.kind_dir(kind);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // `.tmp` and `.corrupted` siblings have a different final extension.
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }

        let mut docs = Vec::new();
        for path in paths
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
        {
            if let Some(doc) = read_document(&path).await? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

/// Read and parse one document file; quarantine on parse failure.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&raw) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            let quarantine = path.with_extension("json.corrupted");
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Quarantining unparsable document"
            );
            if let Err(rename_err) = fs::rename(path, &quarantine).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %rename_err,
                    "Failed to quarantine document"
                );
            }
            Ok(None)
        }
    }
}
