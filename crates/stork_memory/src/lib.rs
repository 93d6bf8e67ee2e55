//! In-memory [`BlobStore`] and [`MetadataStore`] implementations.
//!
//! Both are cheap to clone; clones share the same underlying map. Nothing
//! survives a restart, so these are meant for tests and demos.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use stork_core::prelude::*;

#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<DashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    async fn write_blob(&self, hash: &str, data: Bytes) -> Result<bool, StorageError> {
        match self.blobs.entry(hash.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(data);
                Ok(true)
            }
        }
    }

    async fn read_stream(&self, hash: &str) -> Result<BlobStream, StorageError> {
        let data = self
            .blobs
            .get(hash)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(hash.to_string()))?;
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn delete_blob(&self, hash: &str) -> Result<(), StorageError> {
        self.blobs.remove(hash);
        Ok(())
    }
}

/// Bundle records keyed by id.
#[derive(Clone, Debug, Default)]
pub struct MemoryMetadataStore {
    records: Arc<DashMap<String, Bundle>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
        self.records.insert(bundle.id.clone(), bundle.clone());
        Ok(())
    }

    async fn find(&self, filter: &BundleFilter) -> Result<Vec<Bundle>, PersistenceError> {
        Ok(self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
        match self.records.get_mut(&bundle.id) {
            Some(mut entry) => {
                *entry = bundle.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound(bundle.id.clone())),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
        Ok(self.records.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn clones_share_blobs() {
        let store = MemoryBlobStore::new();
        let other = store.clone();

        assert!(store.write_blob("h1", Bytes::from_static(b"one")).await.unwrap());
        assert!(!other.write_blob("h1", Bytes::from_static(b"two")).await.unwrap());

        let chunks: Vec<Bytes> = other
            .read_stream("h1")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"one");

        other.delete_blob("h1").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn records_filter_and_update() {
        let store = MemoryMetadataStore::new();
        let bundle = Bundle {
            id: "r1".into(),
            version_hash: "h1".into(),
            app_name: "Demo".into(),
            verified: false,
            date: Utc::now(),
            info: BundleInfo {
                name: "a.bundle".into(),
                path: "/bundles/a.bundle?versionhash=h1".into(),
            },
            message: None,
        };
        store.insert(&bundle).await.unwrap();

        let mut verified = bundle.clone();
        verified.verified = true;
        store.update(&verified).await.unwrap();

        let unverified = BundleFilter::from(BundleQuery::default());
        assert!(store.find(&unverified).await.unwrap().is_empty());
        assert_eq!(
            store.find_by_key(&bundle.key()).await.unwrap(),
            Some(verified)
        );

        assert!(store.delete("r1").await.unwrap());
        let err = store.update(&bundle).await.unwrap_err();
        assert!(matches!(err, PersistenceError::NotFound(_)));
    }
}
