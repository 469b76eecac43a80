use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),
    /// Create-only upload hit an existing object.
    #[error("blob already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid blob path: {0}")]
    InvalidPath(String),
    /// The backing service rejected the request or could not be reached.
    #[error("storage backend error: {0}")]
    Backend(String),
}
