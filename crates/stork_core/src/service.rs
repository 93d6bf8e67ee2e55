use crate::bundle::*;
use crate::error::*;
use crate::traits::*;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Path prefix every stored download path starts with.
    ///
    /// Defaults to `/`.
    pub base_path: String,
    /// Accepted file extensions (without the dot). Empty accepts anything.
    pub allowed_extensions: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            allowed_extensions: Vec::new(),
        }
    }
}

/// An upload as received from a client.
#[derive(Debug, Clone)]
pub struct NewBundle {
    pub data: Bytes,
    pub name: String,
    pub app_name: String,
    pub message: Option<NewMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Bundle),
    /// The request carried no `verified` value.
    NotUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeletionOutcome {
    Deleted,
    /// Already gone when the delete ran, e.g. removed by a concurrent request.
    Absent,
    /// Left in place because another record still references it.
    Retained,
    Failed {
        reason: String,
    },
}

/// Independent outcomes of the two halves of a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteReport {
    pub metadata: DeletionOutcome,
    pub blob: DeletionOutcome,
}

/// Bundle lifecycle over a metadata store, a blob store and a notifier.
#[derive(Clone)]
pub struct BundleService<M, B, N> {
    metadata: M,
    blobs: B,
    notifier: N,
    config: ServiceConfig,
}

impl<M, B, N> BundleService<M, B, N>
where
    M: MetadataStore,
    B: BlobStore,
    N: Notifier,
{
    pub fn new(metadata: M, blobs: B, notifier: N) -> Self {
        Self {
            metadata,
            blobs,
            notifier,
            config: ServiceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn validate(&self, upload: &NewBundle) -> Result<(), BundleError> {
        if upload.name.trim().is_empty() {
            return Err(BundleError::Validation("bundle file name is required".into()));
        }
        if upload.app_name.trim().is_empty() {
            return Err(BundleError::Validation("appName is required".into()));
        }
        if upload.data.is_empty() {
            return Err(BundleError::Validation("bundle payload is empty".into()));
        }
        if !self.config.allowed_extensions.is_empty() {
            let ext = Path::new(&upload.name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if !self
                .config
                .allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            {
                return Err(BundleError::Validation(
                    "Unsupported AssetBundle format".into(),
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, upload), fields(name = %upload.name, app = %upload.app_name))]
    pub async fn add_bundle(&self, upload: NewBundle) -> Result<Bundle, BundleError> {
        self.validate(&upload)?;

        let hash = version_hash(&upload.data);
        let key = BundleKey::new(&hash, &upload.name);
        if self.metadata.find_by_key(&key).await?.is_some() {
            return Err(BundleError::AlreadyExists(key.to_string()));
        }

        let created = self.blobs.write_blob(&hash, upload.data).await?;
        debug!(hash = %hash, created, "Blob stored");

        let mut bundle = Bundle {
            id: uuid::Uuid::new_v4().to_string(),
            info: BundleInfo {
                path: download_path(&self.config.base_path, &upload.name, &hash),
                name: upload.name,
            },
            version_hash: hash,
            app_name: upload.app_name,
            verified: false,
            date: Utc::now(),
            message: upload.message.map(BundleMessage::from),
        };

        // The blob stays behind if this fails.
        self.metadata.insert(&bundle).await?;
        info!(id = %bundle.id, hash = %bundle.version_hash, "Bundle created");

        self.deliver_if_ready(&mut bundle).await;
        Ok(bundle)
    }

    /// Lists bundles. Unverified bundles unless `verified` is explicitly `true`.
    pub async fn list_bundles(&self, query: BundleQuery) -> Result<Vec<Bundle>, BundleError> {
        let mut bundles = self.metadata.find(&query.into()).await?;
        bundles.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(bundles)
    }

    pub async fn find_bundle(&self, key: &BundleKey) -> Result<Bundle, BundleError> {
        self.metadata
            .find_by_key(key)
            .await?
            .ok_or_else(|| BundleError::NotFound(key.to_string()))
    }

    /// Resolves the record and opens its blob for streaming.
    pub async fn open_bundle(&self, key: &BundleKey) -> Result<(Bundle, BlobStream), BundleError> {
        let bundle = self.find_bundle(key).await?;
        match self.blobs.read_stream(&bundle.version_hash).await {
            Ok(stream) => Ok((bundle, stream)),
            Err(StorageError::NotFound(hash)) => {
                error!(id = %bundle.id, hash = %hash, "Metadata record has no blob");
                Err(StorageError::NotFound(hash).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn update_bundle(
        &self,
        key: &BundleKey,
        verified: Option<bool>,
    ) -> Result<UpdateOutcome, BundleError> {
        let mut bundle = self.find_bundle(key).await?;
        let Some(verified) = verified else {
            debug!("No verification flag supplied, leaving bundle as is");
            return Ok(UpdateOutcome::NotUpdated);
        };

        bundle.verified = verified;
        self.metadata.update(&bundle).await?;
        info!(id = %bundle.id, verified, "Bundle updated");

        if verified {
            self.deliver_if_ready(&mut bundle).await;
        }
        Ok(UpdateOutcome::Updated(bundle))
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete_bundle(&self, key: &BundleKey) -> Result<DeleteReport, BundleError> {
        let bundle = self.find_bundle(key).await?;
        let shared = self
            .metadata
            .find(&BundleFilter::by_hash(&bundle.version_hash))
            .await?
            .iter()
            .any(|other| other.id != bundle.id);

        let metadata = async {
            match self.metadata.delete(&bundle.id).await {
                Ok(true) => DeletionOutcome::Deleted,
                Ok(false) => {
                    warn!(id = %bundle.id, "Metadata record vanished before it was deleted");
                    DeletionOutcome::Absent
                }
                Err(e) => {
                    warn!(id = %bundle.id, "Failed to delete metadata record: {e}");
                    DeletionOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        let blob = async {
            if shared {
                debug!(hash = %bundle.version_hash, "Blob still referenced, keeping it");
                return DeletionOutcome::Retained;
            }
            match self.blobs.delete_blob(&bundle.version_hash).await {
                Ok(()) => DeletionOutcome::Deleted,
                Err(e) => {
                    warn!(hash = %bundle.version_hash, "Failed to delete blob: {e}");
                    DeletionOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        let (metadata, blob) = futures::join!(metadata, blob);
        info!(id = %bundle.id, ?metadata, ?blob, "Bundle deleted");
        Ok(DeleteReport { metadata, blob })
    }

    /// Attempts delivery when the readiness policy allows it and records the
    /// outcome on the bundle. Never fails.
    async fn deliver_if_ready(&self, bundle: &mut Bundle) {
        let ready = bundle
            .message
            .as_ref()
            .is_some_and(|msg| msg.ready_to_send(bundle.verified));
        let Some(notification) = bundle.notification().filter(|_| ready) else {
            return;
        };

        let delivered = match self.notifier.send(&notification).await {
            Ok(()) => {
                info!(topic = %notification.topic, "Notification sent");
                true
            }
            Err(e) => {
                warn!(topic = %notification.topic, "Notification failed: {e}");
                false
            }
        };

        if let Some(msg) = bundle.message.as_mut() {
            msg.success = Some(delivered);
        }
        if let Err(e) = self.metadata.update(bundle).await {
            warn!(id = %bundle.id, "Failed to record notification outcome: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    // -- Test doubles ---------------------------------------------------------

    #[derive(Clone, Default)]
    struct Records {
        rows: Arc<Mutex<HashMap<String, Bundle>>>,
        fail_insert: Arc<AtomicBool>,
        fail_delete: Arc<AtomicBool>,
        /// Another request removes the row right before ours does.
        lose_delete_race: Arc<AtomicBool>,
    }

    impl MetadataStore for Records {
        async fn insert(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(PersistenceError::Generic("insert refused".into()));
            }
            self.rows
                .lock()
                .unwrap()
                .insert(bundle.id.clone(), bundle.clone());
            Ok(())
        }

        async fn find(&self, filter: &BundleFilter) -> Result<Vec<Bundle>, PersistenceError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect())
        }

        async fn update(&self, bundle: &Bundle) -> Result<(), PersistenceError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&bundle.id) {
                Some(row) => {
                    *row = bundle.clone();
                    Ok(())
                }
                None => Err(PersistenceError::NotFound(bundle.id.clone())),
            }
        }

        async fn delete(&self, id: &str) -> Result<bool, PersistenceError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(PersistenceError::Generic("delete refused".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            if self.lose_delete_race.load(Ordering::SeqCst) {
                rows.remove(id);
            }
            Ok(rows.remove(id).is_some())
        }
    }

    #[derive(Clone, Default)]
    struct Blobs {
        data: Arc<Mutex<HashMap<String, Bytes>>>,
        fail_write: Arc<AtomicBool>,
        fail_delete: Arc<AtomicBool>,
    }

    impl BlobStore for Blobs {
        async fn write_blob(&self, hash: &str, data: Bytes) -> Result<bool, StorageError> {
            if self.fail_write.load(Ordering::SeqCst) {
                return Err(StorageError::Generic("disk full".into()));
            }
            let mut blobs = self.data.lock().unwrap();
            if blobs.contains_key(hash) {
                return Ok(false);
            }
            blobs.insert(hash.to_string(), data);
            Ok(true)
        }

        async fn read_stream(&self, hash: &str) -> Result<BlobStream, StorageError> {
            let data = self
                .data
                .lock()
                .unwrap()
                .get(hash)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(hash.to_string()))?;
            Ok(Box::pin(futures::stream::iter(vec![Ok(data)])))
        }

        async fn delete_blob(&self, hash: &str) -> Result<(), StorageError> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::Generic("blob locked".into()));
            }
            self.data.lock().unwrap().remove(hash);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Outbox {
        sent: Arc<Mutex<Vec<PushNotification>>>,
        fail: Arc<AtomicBool>,
    }

    impl Outbox {
        fn sent(&self) -> Vec<PushNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for Outbox {
        async fn send(&self, notification: &PushNotification) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotificationError::Transport("connection reset".into()));
            }
            Ok(())
        }
    }

    // -- Helpers --------------------------------------------------------------

    struct Harness {
        records: Records,
        blobs: Blobs,
        outbox: Outbox,
        service: BundleService<Records, Blobs, Outbox>,
    }

    fn harness() -> Harness {
        let records = Records::default();
        let blobs = Blobs::default();
        let outbox = Outbox::default();
        let service = BundleService::new(records.clone(), blobs.clone(), outbox.clone());
        Harness {
            records,
            blobs,
            outbox,
            service,
        }
    }

    fn upload(name: &str, app: &str, data: &'static [u8]) -> NewBundle {
        NewBundle {
            data: Bytes::from_static(data),
            name: name.to_string(),
            app_name: app.to_string(),
            message: None,
        }
    }

    fn with_message(mut upload: NewBundle, send_immediate: bool) -> NewBundle {
        upload.message = Some(NewMessage {
            title: "Update".into(),
            body: "New levels available".into(),
            icon: Some("star".into()),
            send_immediate,
        });
        upload
    }

    async fn read_all(stream: BlobStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    // -- Tests ----------------------------------------------------------------

    #[tokio::test]
    async fn add_then_open_returns_identical_bytes() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"level-one"))
            .await
            .unwrap();

        assert!(!bundle.verified);
        assert_eq!(bundle.version_hash, version_hash(b"level-one"));
        assert_eq!(
            bundle.info.path,
            format!("/bundles/a.bundle?versionhash={}", bundle.version_hash)
        );

        let (found, stream) = h.service.open_bundle(&bundle.key()).await.unwrap();
        assert_eq!(found, bundle);
        assert_eq!(read_all(stream).await, b"level-one");
    }

    #[tokio::test]
    async fn identical_content_shares_hash() {
        let h = harness();
        let a = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"same"))
            .await
            .unwrap();
        let b = h
            .service
            .add_bundle(upload("b.bundle", "Demo", b"same"))
            .await
            .unwrap();
        let c = h
            .service
            .add_bundle(upload("c.bundle", "Demo", b"different"))
            .await
            .unwrap();

        assert_eq!(a.version_hash, b.version_hash);
        assert_ne!(a.version_hash, c.version_hash);
        assert_eq!(h.blobs.data.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let h = harness();
        h.service
            .add_bundle(upload("a.bundle", "Demo", b"same"))
            .await
            .unwrap();
        let err = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"same"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::AlreadyExists(_)));
        assert_eq!(h.records.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_validation() {
        let h = harness();
        let err = h
            .service
            .add_bundle(upload("a.bundle", " ", b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Validation(_)));

        let err = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b""))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Validation(_)));

        let h = harness();
        let service = h.service.with_config(ServiceConfig {
            allowed_extensions: vec!["unity3d".into()],
            ..Default::default()
        });
        let err = service
            .add_bundle(upload("a.bundle", "Demo", b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Validation(msg) if msg.contains("Unsupported")));
        assert!(
            service
                .add_bundle(upload("level.UNITY3D", "Demo", b"x"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn blob_failure_is_storage_error() {
        let h = harness();
        h.blobs.fail_write.store(true, Ordering::SeqCst);
        let err = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Storage(_)));
        assert!(h.records.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_keeps_blob() {
        let h = harness();
        h.records.fail_insert.store(true, Ordering::SeqCst);
        let err = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::Persistence(_)));
        assert!(
            h.blobs
                .data
                .lock()
                .unwrap()
                .contains_key(&version_hash(b"orphan"))
        );
    }

    #[tokio::test]
    async fn create_sends_only_immediate_messages() {
        let h = harness();
        let held = h
            .service
            .add_bundle(with_message(upload("a.bundle", "My Game", b"a"), false))
            .await
            .unwrap();
        assert!(h.outbox.sent().is_empty());
        assert_eq!(held.message.unwrap().success, None);

        let sent = h
            .service
            .add_bundle(with_message(upload("b.bundle", "My Game", b"b"), true))
            .await
            .unwrap();
        assert_eq!(sent.message.as_ref().unwrap().success, Some(true));
        let outbox = h.outbox.sent();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].topic, "My-Game");
        assert_eq!(outbox[0].icon.as_deref(), Some("star"));

        let stored = h.service.find_bundle(&sent.key()).await.unwrap();
        assert_eq!(stored.message.unwrap().success, Some(true));
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_create() {
        let h = harness();
        h.outbox.fail.store(true, Ordering::SeqCst);
        let bundle = h
            .service
            .add_bundle(with_message(upload("a.bundle", "Demo", b"a"), true))
            .await
            .unwrap();
        assert_eq!(bundle.message.unwrap().success, Some(false));
    }

    #[tokio::test]
    async fn list_defaults_to_unverified() {
        let h = harness();
        let a = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();
        h.service
            .add_bundle(upload("b.bundle", "Demo", b"b"))
            .await
            .unwrap();
        h.service
            .add_bundle(upload("c.bundle", "Other", b"c"))
            .await
            .unwrap();
        h.service
            .update_bundle(&a.key(), Some(true))
            .await
            .unwrap();

        let unverified = h.service.list_bundles(BundleQuery::default()).await.unwrap();
        assert_eq!(unverified.len(), 2);
        assert!(unverified.iter().all(|b| !b.verified));

        let verified = h
            .service
            .list_bundles(BundleQuery {
                app_name: None,
                verified: Some(true),
            })
            .await
            .unwrap();
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].id, a.id);

        let demo = h
            .service
            .list_bundles(BundleQuery {
                app_name: Some("Demo".into()),
                verified: Some(false),
            })
            .await
            .unwrap();
        assert_eq!(demo.len(), 1);
        assert_eq!(demo[0].info.name, "b.bundle");
    }

    #[tokio::test]
    async fn update_without_flag_is_soft_fail() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();

        let outcome = h.service.update_bundle(&bundle.key(), None).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NotUpdated);
        assert_eq!(h.service.find_bundle(&bundle.key()).await.unwrap(), bundle);
    }

    #[tokio::test]
    async fn update_missing_bundle_is_not_found() {
        let h = harness();
        let err = h
            .service
            .update_bundle(&BundleKey::new("nope", "a.bundle"), Some(true))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::NotFound(_)));
    }

    #[tokio::test]
    async fn verifying_sends_pending_message_once() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(with_message(upload("a.bundle", "Demo", b"a"), false))
            .await
            .unwrap();

        let UpdateOutcome::Updated(updated) = h
            .service
            .update_bundle(&bundle.key(), Some(true))
            .await
            .unwrap()
        else {
            panic!("expected an update");
        };
        assert!(updated.verified);
        assert_eq!(updated.message.unwrap().success, Some(true));
        assert_eq!(h.outbox.sent().len(), 1);

        h.service
            .update_bundle(&bundle.key(), Some(true))
            .await
            .unwrap();
        assert_eq!(h.outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_on_next_verify() {
        let h = harness();
        h.outbox.fail.store(true, Ordering::SeqCst);
        let bundle = h
            .service
            .add_bundle(with_message(upload("a.bundle", "Demo", b"a"), false))
            .await
            .unwrap();

        h.service
            .update_bundle(&bundle.key(), Some(true))
            .await
            .unwrap();
        let stored = h.service.find_bundle(&bundle.key()).await.unwrap();
        assert_eq!(stored.message.unwrap().success, Some(false));

        h.outbox.fail.store(false, Ordering::SeqCst);
        h.service
            .update_bundle(&bundle.key(), Some(true))
            .await
            .unwrap();
        let stored = h.service.find_bundle(&bundle.key()).await.unwrap();
        assert_eq!(stored.message.unwrap().success, Some(true));
        assert_eq!(h.outbox.sent().len(), 2);
    }

    #[tokio::test]
    async fn unverifying_never_sends() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(with_message(upload("a.bundle", "Demo", b"a"), false))
            .await
            .unwrap();
        h.service
            .update_bundle(&bundle.key(), Some(false))
            .await
            .unwrap();
        assert!(h.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_bundle_mutates_nothing() {
        let h = harness();
        h.service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();

        let err = h
            .service
            .delete_bundle(&BundleKey::new(version_hash(b"a"), "other.bundle"))
            .await
            .unwrap_err();
        assert!(matches!(err, BundleError::NotFound(_)));
        assert_eq!(h.records.rows.lock().unwrap().len(), 1);
        assert_eq!(h.blobs.data.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record_and_blob() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();

        let report = h.service.delete_bundle(&bundle.key()).await.unwrap();
        assert_eq!(
            report,
            DeleteReport {
                metadata: DeletionOutcome::Deleted,
                blob: DeletionOutcome::Deleted,
            }
        );
        let Err(err) = h.service.open_bundle(&bundle.key()).await else {
            panic!("expected an error");
        };
        assert!(matches!(err, BundleError::NotFound(_)));
        assert!(h.blobs.data.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_shared_blob() {
        let h = harness();
        let a = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"same"))
            .await
            .unwrap();
        let b = h
            .service
            .add_bundle(upload("b.bundle", "Demo", b"same"))
            .await
            .unwrap();

        let report = h.service.delete_bundle(&a.key()).await.unwrap();
        assert_eq!(report.blob, DeletionOutcome::Retained);

        let (_, stream) = h.service.open_bundle(&b.key()).await.unwrap();
        assert_eq!(read_all(stream).await, b"same");
    }

    #[tokio::test]
    async fn delete_reports_partial_failures_independently() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();
        h.blobs.fail_delete.store(true, Ordering::SeqCst);

        let report = h.service.delete_bundle(&bundle.key()).await.unwrap();
        assert_eq!(report.metadata, DeletionOutcome::Deleted);
        assert!(matches!(report.blob, DeletionOutcome::Failed { .. }));

        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();
        h.records.fail_delete.store(true, Ordering::SeqCst);

        let report = h.service.delete_bundle(&bundle.key()).await.unwrap();
        assert!(matches!(report.metadata, DeletionOutcome::Failed { .. }));
        assert_eq!(report.blob, DeletionOutcome::Deleted);
    }

    #[tokio::test]
    async fn delete_reports_record_removed_concurrently() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();
        h.records.lose_delete_race.store(true, Ordering::SeqCst);

        let report = h.service.delete_bundle(&bundle.key()).await.unwrap();
        assert_eq!(report.metadata, DeletionOutcome::Absent);
        assert_eq!(report.blob, DeletionOutcome::Deleted);
        assert!(h.records.rows.lock().unwrap().is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metadata"]["status"], "absent");
    }

    #[tokio::test]
    async fn missing_blob_surfaces_as_storage_not_found() {
        let h = harness();
        let bundle = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"a"))
            .await
            .unwrap();
        h.blobs.data.lock().unwrap().clear();

        let Err(err) = h.service.open_bundle(&bundle.key()).await else {
            panic!("expected an error");
        };
        assert!(matches!(
            err,
            BundleError::Storage(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn moderation_scenario() {
        let h = harness();
        let a = h
            .service
            .add_bundle(upload("a.bundle", "Demo", b"scenario"))
            .await
            .unwrap();
        let demo = |verified| BundleQuery {
            app_name: Some("Demo".into()),
            verified,
        };

        let listed = h.service.list_bundles(demo(None)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].verified);

        h.service.update_bundle(&a.key(), Some(true)).await.unwrap();
        let listed = h.service.list_bundles(demo(Some(true))).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].verified);

        h.service.delete_bundle(&a.key()).await.unwrap();
        let Err(err) = h.service.open_bundle(&a.key()).await else {
            panic!("expected an error");
        };
        assert!(matches!(err, BundleError::NotFound(_)));
    }
}
