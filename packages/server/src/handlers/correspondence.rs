use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::extract::multipart::Field;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cms_common::CorrespondenceRecord;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::validated::{AppJson, AppQuery};
use crate::models::correspondence::{
    ActivityListResponse, CorrespondenceDetailResponse, CorrespondenceListQuery,
    CorrespondenceListResponse, CreateCorrespondenceResponse, UpdateStatusRequest,
};
use crate::services::intake::{IntakeFile, IntakeForm};
use crate::services::{detail, intake, search};
use crate::state::AppState;
use crate::utils::filename::content_disposition_value;

/// Body limit for the create route, which carries every file of a record.
pub fn create_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(128 * 1024 * 1024)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Correspondence",
    operation_id = "listCorrespondence",
    summary = "Search correspondence",
    description = "Case-insensitive search over subject, sender, recipient and registry number, \
        with optional status and date filters. The full ordered result is computed on every \
        request and one page of it is returned. No matches is an empty page, not an error.",
    params(CorrespondenceListQuery),
    responses(
        (status = 200, description = "One page of matching records", body = CorrespondenceListResponse),
        (status = 400, description = "Invalid filter or sort (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_correspondence(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<CorrespondenceListQuery>,
) -> Result<Json<CorrespondenceListResponse>, AppError> {
    let page = search::search(
        &*state.records,
        &query,
        state.config.correspondence.page_size,
    )
    .await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Correspondence",
    operation_id = "createCorrespondence",
    summary = "Register new correspondence",
    description = "Multipart form with `subject`, `sender` and `recipient` (required), optional \
        `registry_number`, `date` (YYYY-MM-DD), `department`, `status` and `description` \
        (alias `message_content`), and any number of `files`. Everything is validated before \
        anything is stored. Files are uploaded one at a time after the record is saved; if one \
        fails the record is kept and `PARTIAL_FAILURE` lists what was stored.",
    request_body(content_type = "multipart/form-data", description = "Correspondence fields and files"),
    responses(
        (status = 201, description = "Record created", body = CreateCorrespondenceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 502, description = "Record saved but an upload failed (PARTIAL_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn create_correspondence(
    auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_form(multipart).await?;
    let created = intake::create(&state, form, auth_user.user_id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))
}

async fn read_form(mut multipart: Multipart) -> Result<IntakeForm, AppError> {
    let mut form = IntakeForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "subject" => form.subject = Some(field_text(field).await?),
            "sender" => form.sender = Some(field_text(field).await?),
            "recipient" => form.recipient = Some(field_text(field).await?),
            "registry_number" => form.registry_number = Some(field_text(field).await?),
            "date" => form.date = Some(field_text(field).await?),
            "department" => form.department = Some(field_text(field).await?),
            "status" => form.status = Some(field_text(field).await?),
            "description" | "message_content" => {
                form.description = Some(field_text(field).await?);
            }
            "files" | "files[]" | "file" => {
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
                form.files.push(IntakeFile {
                    name,
                    content_type,
                    data,
                });
            }
            _ => {} // Ignore unknown fields.
        }
    }
    Ok(form)
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Correspondence",
    operation_id = "getCorrespondence",
    summary = "Get a record with its attachments and activity",
    description = "Attachments are listed from object storage. If listing fails the record is \
        still returned, with no attachments.",
    params(("id" = Uuid, Path, description = "Correspondence ID")),
    responses(
        (status = 200, description = "Record detail", body = CorrespondenceDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn get_correspondence(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CorrespondenceDetailResponse>, AppError> {
    Ok(Json(detail::get_detail(&state, id).await?))
}

#[utoipa::path(
    patch,
    path = "/{id}/status",
    tag = "Correspondence",
    operation_id = "updateCorrespondenceStatus",
    summary = "Change a record's status",
    description = "Setting the status a record already has returns it unchanged without writing.",
    params(("id" = Uuid, Path, description = "Correspondence ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated record", body = CorrespondenceRecord),
        (status = 400, description = "Unknown status (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_status(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<CorrespondenceRecord>, AppError> {
    let record = detail::update_status(&state, id, &payload.status, auth_user.user_id).await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/{id}/activity",
    tag = "Correspondence",
    operation_id = "listCorrespondenceActivity",
    summary = "List a record's activity, newest first",
    params(("id" = Uuid, Path, description = "Correspondence ID")),
    responses(
        (status = 200, description = "Activity entries", body = ActivityListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn list_activity(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActivityListResponse>, AppError> {
    let data = detail::activity(&state, id).await?;
    Ok(Json(ActivityListResponse { data }))
}

#[utoipa::path(
    get,
    path = "/{id}/attachments/{filename}",
    tag = "Correspondence",
    operation_id = "downloadAttachment",
    summary = "Download an attachment",
    description = "Returns the file with `Content-Disposition: attachment` so browsers save it.",
    params(
        ("id" = Uuid, Path, description = "Correspondence ID"),
        ("filename" = String, Path, description = "Attachment file name"),
    ),
    responses(
        (status = 200, description = "Attachment content"),
        (status = 400, description = "Invalid file name (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Attachment not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user))]
pub async fn download_attachment(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, filename)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let data = detail::download(&state, id, &filename).await?;
    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, data.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&filename),
        )
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}
