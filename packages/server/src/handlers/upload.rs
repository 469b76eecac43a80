use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::Json;
use chrono::Utc;
use cms_common::storage::UploadOptions;
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::upload::UploadResponse;
use crate::state::AppState;
use crate::utils::filename::validate_flat_filename;

/// Folder that standalone uploads land in.
pub const UPLOAD_FOLDER: &str = "correspondences";

/// Lifetime of the URL returned for a fresh upload.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(32 * 1024 * 1024)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Upload",
    operation_id = "uploadFile",
    summary = "Store a single file",
    description = "Stores the `file` field under `correspondences/{unix millis}-{filename}`, never \
        replacing an existing object, and returns its path with a URL valid for one hour.",
    request_body(content_type = "multipart/form-data", description = "A single `file` field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file provided (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 500, description = "Storage error (INTERNAL_ERROR)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn upload_file(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("No file provided".into()))?;
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
        file = Some((filename, content_type, data));
        break;
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| AppError::Validation("No file provided".into()))?;
    let filename =
        validate_flat_filename(&filename).map_err(|e| AppError::Validation(e.message().into()))?;
    let max_size = state.config.storage.max_upload_size;
    if data.len() > max_size {
        return Err(AppError::Validation(format!(
            "File is {} bytes, the limit is {max_size} bytes",
            data.len()
        )));
    }

    let path = format!("{UPLOAD_FOLDER}/{}-{filename}", Utc::now().timestamp_millis());
    let content_type =
        content_type.or_else(|| mime_guess::from_path(filename).first().map(|m| m.to_string()));

    state
        .blobs
        .upload(&path, data, UploadOptions::create_only(content_type))
        .await
        .map_err(|e| AppError::Internal(format!("Upload to {path} failed: {e}")))?;
    let signed_url = state
        .blobs
        .signed_url(&path, SIGNED_URL_TTL)
        .await
        .map_err(|e| AppError::Internal(format!("Signing {path} failed: {e}")))?;

    info!(path = %path, "File uploaded");
    Ok(Json(UploadResponse { path, signed_url }))
}
