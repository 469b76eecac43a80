use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::{BlobEntry, BlobStore, UploadOptions, check_path, normalize_prefix};

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
}

/// In-process blob store for development and tests.
///
/// Supports fault injection so callers can exercise partial-failure paths.
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
    base_url: String,
    calls: AtomicUsize,
    uploads: AtomicUsize,
    fail_uploads_after: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            calls: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            fail_uploads_after: AtomicUsize::new(usize::MAX),
            fail_listing: AtomicBool::new(false),
        }
    }

    /// Let `n` more uploads succeed, then fail every following upload.
    pub fn fail_uploads_after(&self, n: usize) {
        let done = self.uploads.load(Ordering::SeqCst);
        self.fail_uploads_after
            .store(done.saturating_add(n), Ordering::SeqCst);
    }

    /// Make every `list` call fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Number of trait calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths currently stored, in order.
    pub async fn paths(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> Result<(), StorageError> {
        self.touch();
        check_path(path)?;

        let attempt = self.uploads.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.fail_uploads_after.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!(
                "injected upload failure for {path}"
            )));
        }

        let mut blobs = self.blobs.write().await;
        if !options.overwrite && blobs.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        blobs.insert(
            path.to_string(),
            StoredBlob {
                data,
                content_type: options.content_type,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError> {
        self.touch();
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected listing failure".into()));
        }

        let prefix = normalize_prefix(prefix);
        let blobs = self.blobs.read().await;
        Ok(blobs
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(prefix.as_str())
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(path, blob)| BlobEntry {
                path: path.clone(),
                size: blob.data.len() as u64,
                content_type: blob.content_type.clone(),
            })
            .collect())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        self.touch();
        check_path(path)?;
        if !self.blobs.read().await.contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("{}/{}?expires={expires}", self.base_url, path))
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        self.touch();
        self.blobs
            .read()
            .await
            .get(path)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}
