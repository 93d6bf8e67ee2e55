use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Metadata backend error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("Authentication provider error: {0}")]
    Generic(String),
}

/// A failed delivery attempt. Never fatal to the operation that triggered it.
#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Push gateway rejected notification ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Push transport error: {0}")]
    Transport(String),
}

/// Errors surfaced by [`BundleService`](crate::service::BundleService) operations.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bundle not found: {0}")]
    NotFound(String),

    #[error("Bundle already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
