mod error;
mod traits;

pub mod memory;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use error::StorageError;
pub use traits::{BlobEntry, BlobStore, UploadOptions, check_path, normalize_prefix};
