use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A versioned binary artifact record. The binary itself lives in a
/// [`BlobStore`](crate::traits::BlobStore) under [`Bundle::version_hash`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Opaque record id, only meaningful to the metadata store.
    pub id: String,

    /// Lowercase hex SHA256 of the payload.
    pub version_hash: String,

    /// Owning application. Also the source of the notification topic.
    pub app_name: String,

    pub verified: bool,

    pub date: DateTime<Utc>,

    pub info: BundleInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<BundleMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleInfo {
    /// Original file name of the upload.
    pub name: String,

    /// Download path. Stored host-relative, qualified per response.
    pub path: String,
}

/// Notification payload attached to a bundle version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMessage {
    pub title: String,
    pub body: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default)]
    pub send_immediate: bool,

    /// Outcome of the last delivery attempt. `None` until one happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
}

/// The `(versionHash, info.name)` pair every single-bundle operation looks up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub version_hash: String,
    pub name: String,
}

impl BundleKey {
    pub fn new(version_hash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            version_hash: version_hash.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for BundleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.version_hash)
    }
}

/// Record filter understood by every [`MetadataStore`](crate::traits::MetadataStore).
/// `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BundleFilter {
    pub app_name: Option<String>,
    pub verified: Option<bool>,
    pub version_hash: Option<String>,
    pub name: Option<String>,
}

impl BundleFilter {
    pub fn by_key(key: &BundleKey) -> Self {
        Self {
            version_hash: Some(key.version_hash.clone()),
            name: Some(key.name.clone()),
            ..Default::default()
        }
    }

    pub fn by_hash(version_hash: &str) -> Self {
        Self {
            version_hash: Some(version_hash.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, bundle: &Bundle) -> bool {
        self.app_name.as_ref().is_none_or(|a| *a == bundle.app_name)
            && self.verified.is_none_or(|v| v == bundle.verified)
            && self
                .version_hash
                .as_ref()
                .is_none_or(|h| *h == bundle.version_hash)
            && self.name.as_ref().is_none_or(|n| *n == bundle.info.name)
    }
}

/// Caller-facing listing query.
#[derive(Debug, Clone, Default)]
pub struct BundleQuery {
    pub app_name: Option<String>,
    /// Only an explicit `Some(true)` selects verified bundles.
    pub verified: Option<bool>,
}

impl From<BundleQuery> for BundleFilter {
    fn from(query: BundleQuery) -> Self {
        Self {
            app_name: query.app_name,
            verified: Some(query.verified.unwrap_or(false)),
            ..Default::default()
        }
    }
}

/// Message fields accepted at upload time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub send_immediate: bool,
}

impl From<NewMessage> for BundleMessage {
    fn from(msg: NewMessage) -> Self {
        Self {
            title: msg.title,
            body: msg.body,
            icon: msg.icon,
            send_immediate: msg.send_immediate,
            success: None,
        }
    }
}

/// A push notification ready to hand to a [`Notifier`](crate::traits::Notifier).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushNotification {
    pub topic: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
}

impl BundleMessage {
    /// Whether a delivery attempt should be made for a bundle in the given
    /// verification state.
    pub fn ready_to_send(&self, verified: bool) -> bool {
        if self.send_immediate {
            return true;
        }
        if self.success == Some(true) {
            return false;
        }
        verified
    }
}

impl Bundle {
    pub fn key(&self) -> BundleKey {
        BundleKey::new(&self.version_hash, &self.info.name)
    }

    pub fn topic(&self) -> String {
        topic_for(&self.app_name)
    }

    pub fn notification(&self) -> Option<PushNotification> {
        self.message.as_ref().map(|msg| PushNotification {
            topic: self.topic(),
            title: msg.title.clone(),
            body: msg.body.clone(),
            icon: msg.icon.clone(),
        })
    }

    /// Returns a copy whose `info.path` is prefixed with `origin`
    /// (e.g. `https://assets.example.com`).
    pub fn qualified(mut self, origin: &str) -> Self {
        self.info.path = format!("{}{}", origin.trim_end_matches('/'), self.info.path);
        self
    }
}

/// Derives the notification topic from an application name.
/// Push backends reject whitespace in topic names.
pub fn topic_for(app_name: &str) -> String {
    app_name.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Content hash used as the version hash and blob key.
pub fn version_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Normalizes a mount prefix to `""` or `/segment[/segment...]`.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Host-relative download path for a bundle.
pub fn download_path(base_path: &str, name: &str, version_hash: &str) -> String {
    format!(
        "{}/bundles/{}?versionhash={version_hash}",
        normalize_base_path(base_path),
        utf8_percent_encode(name, PATH_SEGMENT)
    )
}
