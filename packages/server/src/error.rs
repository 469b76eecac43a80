use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cms_common::storage::StorageError;
use cms_common::store::StoreError;
use sea_orm::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `INVALID_CREDENTIALS`, `EMAIL_NOT_CONFIRMED`, `NOT_FOUND`,
    /// `PARTIAL_FAILURE`, `UPSTREAM_UNAVAILABLE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "sender is required")]
    pub message: String,
    /// Present only for `PARTIAL_FAILURE`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PartialFailureDetails>,
}

/// What was persisted before a create sequence stopped.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct PartialFailureDetails {
    /// Id of the record that was inserted and kept.
    pub record_id: Uuid,
    /// Blob paths uploaded before the failure.
    pub uploaded: Vec<String>,
    /// Name of the file whose upload failed.
    pub failed_file: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    TokenMissing,
    TokenInvalid,
    /// The session store rejected the credentials. Carries its message.
    InvalidCredentials(String),
    EmailNotConfirmed,
    NotFound(String),
    PartialFailure {
        message: String,
        details: PartialFailureDetails,
    },
    Unavailable(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, message, details) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, None),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_MISSING",
                "Authentication required".into(),
                None,
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_INVALID",
                "Invalid or expired token".into(),
                None,
            ),
            AppError::InvalidCredentials(msg) => {
                (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS", msg, None)
            }
            AppError::EmailNotConfirmed => (
                StatusCode::FORBIDDEN,
                "EMAIL_NOT_CONFIRMED",
                "Please confirm your email address before signing in".into(),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::PartialFailure { message, details } => {
                tracing::warn!(
                    record_id = %details.record_id,
                    uploaded = details.uploaded.len(),
                    failed_file = %details.failed_file,
                    "Partial failure: {message}"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "PARTIAL_FAILURE",
                    message,
                    Some(details),
                )
            }
            AppError::Unavailable(detail) => {
                tracing::warn!("Upstream unavailable: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UPSTREAM_UNAVAILABLE",
                    "The service is temporarily unreachable. Please try again.".into(),
                    None,
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An unexpected error occurred".into(),
                    None,
                )
            }
        };
        (
            status,
            ErrorBody {
                code,
                message,
                details,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(msg) => AppError::InvalidCredentials(msg),
            StoreError::InvalidSession => AppError::TokenInvalid,
            StoreError::EmailNotConfirmed => AppError::EmailNotConfirmed,
            StoreError::Unavailable(detail) => AppError::Unavailable(detail),
            StoreError::Internal(detail) => AppError::Internal(detail),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                tracing::debug!("Blob not found: {path}");
                AppError::NotFound("Attachment not found".into())
            }
            StorageError::InvalidPath(msg) => AppError::Validation(format!("Invalid path: {msg}")),
            StorageError::AlreadyExists(path) => {
                AppError::Internal(format!("Blob already exists: {path}"))
            }
            StorageError::Backend(msg) => AppError::Internal(format!("Storage backend: {msg}")),
        }
    }
}
