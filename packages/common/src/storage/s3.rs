use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tracing::{debug, instrument};

use super::error::StorageError;
use super::traits::{BlobEntry, BlobStore, UploadOptions, check_path, normalize_prefix};

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO or a hosted storage gateway. Enables path-style addressing.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Base for public object URLs. Defaults to the bucket URL.
    pub public_base_url: Option<String>,
}

/// Blob store backed by an S3-compatible bucket.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let credentials = Credentials::new(
            settings.access_key.as_deref(),
            settings.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid S3 credentials: {e}")))?;

        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse::<Region>()
                .map_err(|e| StorageError::Backend(format!("invalid S3 region: {e}")))?,
        };

        let mut bucket = Bucket::new(&settings.bucket, region, credentials).map_err(backend)?;
        if settings.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        let public_base_url = settings
            .public_base_url
            .clone()
            .unwrap_or_else(|| bucket.url())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bucket,
            public_base_url,
        })
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match self.bucket.head_object(path).await {
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) if (200..300).contains(&code) => Ok(true),
            Ok((_, code)) => Err(StorageError::Backend(format!(
                "HEAD {path} returned status {code}"
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(backend(e)),
        }
    }
}

fn backend(e: S3Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn ensure_success(op: &str, path: &str, code: u16) -> Result<(), StorageError> {
    match code {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(path.to_string())),
        _ => Err(StorageError::Backend(format!(
            "{op} {path} returned status {code}"
        ))),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> Result<(), StorageError> {
        check_path(path)?;
        if !options.overwrite && self.exists(path).await? {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let content_type = options
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        let response = self
            .bucket
            .put_object_with_content_type(path, &data, content_type)
            .await
            .map_err(backend)?;
        ensure_success("PUT", path, response.status_code())?;
        debug!(path, "Object stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<BlobEntry>, StorageError> {
        let prefix = normalize_prefix(prefix);
        let pages = self
            .bucket
            .list(prefix.clone(), Some("/".to_string()))
            .await
            .map_err(backend)?;

        let mut entries: Vec<BlobEntry> = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .filter(|object| object.key.len() > prefix.len() && !object.key.ends_with('/'))
            .map(|object| BlobEntry {
                path: object.key,
                size: object.size,
                content_type: None,
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        check_path(path)?;
        let secs = u32::try_from(ttl.as_secs()).unwrap_or(u32::MAX);
        self.bucket
            .presign_get(path, secs, None)
            .await
            .map_err(backend)
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        check_path(path)?;
        let response = match self.bucket.get_object(path).await {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(404, _)) => {
                return Err(StorageError::NotFound(path.to_string()));
            }
            Err(e) => return Err(backend(e)),
        };
        ensure_success("GET", path, response.status_code())?;
        Ok(Bytes::copy_from_slice(response.as_slice()))
    }
}
