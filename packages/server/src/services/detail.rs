use bytes::Bytes;
use chrono::Utc;
use cms_common::activity::{ACTION_STATUS_UPDATED, NewActivity};
use cms_common::attachment::{attachment_path, record_prefix};
use cms_common::{
    ActivityLogEntry, Attachment, CorrespondenceRecord, CorrespondenceStatus, StatusChange,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::config::UrlMode;
use crate::error::AppError;
use crate::models::correspondence::CorrespondenceDetailResponse;
use crate::state::AppState;
use crate::utils::filename::validate_flat_filename;

fn not_found() -> AppError {
    AppError::NotFound("Correspondence not found".into())
}

async fn find(state: &AppState, id: Uuid) -> Result<CorrespondenceRecord, AppError> {
    state.records.get(id).await?.ok_or_else(not_found)
}

#[instrument(skip(state))]
pub async fn get_detail(
    state: &AppState,
    id: Uuid,
) -> Result<CorrespondenceDetailResponse, AppError> {
    let correspondence = find(state, id).await?;
    let attachments = attachments(state, id).await;
    let activity = match state.records.list_activity(&id.to_string()).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "Failed to load activity; showing none");
            Vec::new()
        }
    };
    Ok(CorrespondenceDetailResponse {
        correspondence,
        attachments,
        activity,
    })
}

/// Files stored under the record's prefix. A listing failure yields no
/// attachments rather than failing the detail view.
pub async fn attachments(state: &AppState, id: Uuid) -> Vec<Attachment> {
    let entries = match state.blobs.list(&record_prefix(id)).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(record_id = %id, error = %e, "Failed to list attachments; showing none");
            return Vec::new();
        }
    };

    let storage = &state.config.storage;
    let mut attachments = Vec::with_capacity(entries.len());
    for entry in entries {
        let url = match storage.url_mode {
            UrlMode::Public => state.blobs.public_url(&entry.path),
            UrlMode::Signed => match state
                .blobs
                .signed_url(&entry.path, storage.signed_url_ttl())
                .await
            {
                Ok(url) => url,
                Err(e) => {
                    warn!(path = %entry.path, error = %e, "Failed to sign attachment URL");
                    state.blobs.public_url(&entry.path)
                }
            },
        };
        attachments.push(Attachment::from_entry(entry, url));
    }
    attachments
}

/// Set the record's status. Setting the current status again is a no-op.
#[instrument(skip(state))]
pub async fn update_status(
    state: &AppState,
    id: Uuid,
    status: &str,
    user_id: Uuid,
) -> Result<CorrespondenceRecord, AppError> {
    let status: CorrespondenceStatus = status
        .parse()
        .map_err(|e: cms_common::correspondence_status::ParseStatusError| {
            AppError::Validation(e.to_string())
        })?;

    let current = find(state, id).await?;
    if current.status == status {
        return Ok(current);
    }

    let change = StatusChange {
        status,
        updated_by: Some(user_id),
        updated_at: Utc::now(),
    };
    let updated = state
        .records
        .update_status(id, change)
        .await?
        .ok_or_else(not_found)?;

    let entry = NewActivity::new(
        id,
        Some(user_id),
        ACTION_STATUS_UPDATED,
        format!("Status changed from {} to {}", current.status, updated.status),
    );
    if let Err(e) = state.records.insert_activity(entry).await {
        warn!(record_id = %id, error = %e, "Failed to record status change activity");
    }
    Ok(updated)
}

#[instrument(skip(state))]
pub async fn activity(state: &AppState, id: Uuid) -> Result<Vec<ActivityLogEntry>, AppError> {
    find(state, id).await?;
    Ok(state.records.list_activity(&id.to_string()).await?)
}

/// Bytes of one attachment, addressed by record and file name.
#[instrument(skip(state))]
pub async fn download(state: &AppState, id: Uuid, filename: &str) -> Result<Bytes, AppError> {
    let filename =
        validate_flat_filename(filename).map_err(|e| AppError::Validation(e.message().into()))?;
    Ok(state.blobs.download(&attachment_path(id, filename)).await?)
}
