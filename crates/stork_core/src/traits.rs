use crate::bundle::*;
use crate::error::*;

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// Byte stream handed out by [`BlobStore::read_stream`].
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Content-addressed binary storage keyed by version hash.
pub trait BlobStore: Send + Sync + 'static + Clone {
    /// Stores `data` under `hash`. Returns `false` if the blob already existed.
    fn write_blob(
        &self,
        hash: &str,
        data: Bytes,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn read_stream(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<BlobStream, StorageError>> + Send;

    /// Removes the blob. Deleting a missing blob is not an error.
    fn delete_blob(&self, hash: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Persistent store of [`Bundle`] records.
pub trait MetadataStore: Send + Sync + 'static + Clone {
    fn insert(&self, bundle: &Bundle) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn find(
        &self,
        filter: &BundleFilter,
    ) -> impl Future<Output = Result<Vec<Bundle>, PersistenceError>> + Send;

    /// Replaces the record with the same id.
    fn update(&self, bundle: &Bundle) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Returns whether a record was removed.
    fn delete(&self, id: &str) -> impl Future<Output = Result<bool, PersistenceError>> + Send;

    fn find_by_key(
        &self,
        key: &BundleKey,
    ) -> impl Future<Output = Result<Option<Bundle>, PersistenceError>> + Send {
        let filter = BundleFilter::by_key(key);
        async move { Ok(self.find(&filter).await?.into_iter().next()) }
    }
}

/// Push notification delivery channel.
pub trait Notifier: Send + Sync + 'static + Clone {
    fn send(
        &self,
        notification: &PushNotification,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

pub trait AuthProvider: Send + Sync + 'static + Clone {
    fn verify(&self, token: &str) -> impl Future<Output = Result<User, AuthError>> + Send;
}
