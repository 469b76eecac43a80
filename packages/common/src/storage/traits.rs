use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::StorageError;

/// One object returned by [`BlobStore::list`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobEntry {
    /// Full path, including the listed prefix.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    pub content_type: Option<String>,
}

impl BlobEntry {
    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Options for [`BlobStore::upload`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing blob at the same path instead of failing.
    pub overwrite: bool,
    pub content_type: Option<String>,
}

impl UploadOptions {
    pub fn overwrite(content_type: Option<String>) -> Self {
        Self {
            overwrite: true,
            content_type,
        }
    }

    pub fn create_only(content_type: Option<String>) -> Self {
        Self {
            overwrite: false,
            content_type,
        }
    }
}

/// Path-keyed object storage for attachment files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` at `path`.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> Result<(), StorageError>;

    /// Objects directly under `prefix` (one level, no recursion), sorted by path.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError>;

    /// Unauthenticated URL for `path`. Only meaningful for public buckets.
    fn public_url(&self, path: &str) -> String;

    /// Time-limited URL for `path`.
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Retrieve all bytes of the blob at `path`.
    async fn download(&self, path: &str) -> Result<Bytes, StorageError>;
}

/// Normalize a listing prefix to `segment/segment/` form.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Reject paths that cannot address a single object.
pub fn check_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(StorageError::InvalidPath(format!("'{path}'")));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(StorageError::InvalidPath(format!("'{path}'")));
    }
    Ok(())
}
