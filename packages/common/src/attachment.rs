use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::BlobEntry;

/// A file stored under a record's blob prefix.
///
/// Attachments are not stored as rows; they are derived by listing
/// `{record_id}/` in the blob store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Attachment {
    #[schema(example = "budget.pdf")]
    pub name: String,
    /// Size in bytes.
    #[schema(example = 2097152)]
    pub size: u64,
    /// Size rendered for listings, e.g. `2048.00 KB`.
    pub size_label: String,
    /// Upper-cased file extension, or `FILE` when there is none.
    #[serde(rename = "type")]
    #[schema(example = "PDF")]
    pub kind: String,
    /// Full blob path, `{record_id}/{name}`.
    pub path: String,
    /// Public or signed URL, depending on server configuration.
    pub url: String,
}

impl Attachment {
    pub fn from_entry(entry: BlobEntry, url: String) -> Self {
        let name = entry.name().to_string();
        Self {
            kind: file_kind(&name),
            name,
            size: entry.size,
            size_label: size_label(entry.size),
            path: entry.path,
            url,
        }
    }
}

/// Blob path prefix that holds a record's attachments.
pub fn record_prefix(record_id: Uuid) -> String {
    record_id.to_string()
}

/// Blob path of one attachment.
pub fn attachment_path(record_id: Uuid, filename: &str) -> String {
    format!("{record_id}/{filename}")
}

/// Derive the display type from a filename's extension.
pub fn file_kind(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_uppercase(),
        _ => "FILE".to_string(),
    }
}

/// Human-readable size in KB with two decimals, as shown in listings.
pub fn size_label(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}
