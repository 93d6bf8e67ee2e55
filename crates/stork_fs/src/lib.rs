//! # Stork FileSystem Storage
//!
//! Local filesystem backends for Stork.
//!
//! This crate implements the [`BlobStore`] trait, storing bundle payloads
//! directly in the file system keyed by their version hash, and the
//! [`MetadataStore`] trait, keeping one JSON document per bundle record.
//!
//! ## Features
//!
//! * **Atomic Writes**: Every write goes to its own temporary file which is then linked or renamed into place, so bundles and records are never read partially, even under concurrent writers.
//! * **Streaming Reads**: Blobs are streamed from disk instead of buffered.
//!
//! ## Usage
//!
//! ```no_run
//! use stork_fs::{FileSystemBlobStore, FileSystemMetadataStore};
//!
//! let blobs = FileSystemBlobStore::new("./stork_data/blobs");
//! let records = FileSystemMetadataStore::new("./stork_data/bundles");
//! ```

use bytes::Bytes;
use std::path::{Path, PathBuf};
use stork_core::prelude::*;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A sibling temp path unique to this write. Hidden and `.tmp`-suffixed so
/// record scans skip it.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}

async fn write_temp(path: &Path, data: Bytes) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = temp_path(path);
    if let Err(e) = fs::write(&tmp_path, data).await {
        discard(&tmp_path).await;
        return Err(e);
    }
    Ok(tmp_path)
}

async fn discard(tmp_path: &Path) {
    match fs::remove_file(tmp_path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warn!(path = %tmp_path.display(), "Failed to remove temp file: {e}");
        }
        _ => {}
    }
}

/// Replaces `path` with `data`. Readers see either the old or the new content.
async fn atomic_write(path: &Path, data: Bytes) -> std::io::Result<()> {
    let tmp_path = write_temp(path, data).await?;
    if let Err(e) = fs::rename(&tmp_path, path).await {
        discard(&tmp_path).await;
        return Err(e);
    }
    Ok(())
}

/// Publishes `data` at `path` only if nothing is there yet.
/// Returns `false` when another writer got there first.
async fn atomic_create(path: &Path, data: Bytes) -> std::io::Result<bool> {
    let tmp_path = write_temp(path, data).await?;
    let linked = fs::hard_link(&tmp_path, path).await;
    discard(&tmp_path).await;

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/// Keys become file names, so only plain identifiers are accepted.
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
}

impl FileSystemBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    fn get_path(&self, hash: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_key(hash) {
            return Err(StorageError::Generic(format!("Invalid blob key: {hash}")));
        }
        Ok(self.root.join(hash))
    }
}

impl BlobStore for FileSystemBlobStore {
    #[instrument(skip(self, data), fields(root = %self.root.display()))]
    async fn write_blob(&self, hash: &str, data: Bytes) -> Result<bool, StorageError> {
        let path = self.get_path(hash)?;
        if fs::try_exists(&path).await? {
            debug!("Blob already exists");
            return Ok(false);
        }
        let created = atomic_create(&path, data).await?;
        if !created {
            debug!("Blob was stored concurrently");
        }
        Ok(created)
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn read_stream(&self, hash: &str) -> Result<BlobStream, StorageError> {
        let path = self.get_path(hash)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(ReaderStream::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(hash.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn delete_blob(&self, hash: &str) -> Result<(), StorageError> {
        let path = self.get_path(hash)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Stores each [`Bundle`] as `{root}/{id}.json`.
#[derive(Clone)]
pub struct FileSystemMetadataStore {
    root: PathBuf,
}

impl FileSystemMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    fn get_path(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        if !is_safe_key(id) {
            return Err(PersistenceError::Generic(format!("Invalid record id: {id}")));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    async fn write_record(&self, path: &Path, bundle: &Bundle) -> Result<(), PersistenceError> {
        let data = Bytes::from(serde_json::to_vec_pretty(bundle)?);
        atomic_write(path, data).await?;
        Ok(())
    }
}

impl MetadataStore for FileSystemMetadataStore {
    #[instrument(skip(self, bundle), fields(id = %bundle.id))]
    async fn insert(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
        let path = self.get_path(&bundle.id)?;
        self.write_record(&path, bundle).await
    }

    async fn find(&self, filter: &BundleFilter) -> Result<Vec<Bundle>, PersistenceError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut bundles = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            // A record may vanish between listing and reading.
            let data = match fs::read(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            match serde_json::from_slice::<Bundle>(&data) {
                Ok(bundle) if filter.matches(&bundle) => bundles.push(bundle),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), "Skipping unreadable record: {e}"),
            }
        }

        Ok(bundles)
    }

    #[instrument(skip(self, bundle), fields(id = %bundle.id))]
    async fn update(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
        let path = self.get_path(&bundle.id)?;
        if !fs::try_exists(&path).await? {
            return Err(PersistenceError::NotFound(bundle.id.clone()));
        }
        self.write_record(&path, bundle).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
        let path = self.get_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
