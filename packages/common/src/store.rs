//! Client interfaces for the hosted session and record stores.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::activity::{ActivityLogEntry, NewActivity};
use crate::correspondence::{CorrespondenceRecord, NewCorrespondence, StatusChange};
use crate::search::SearchQuery;
use crate::session::{Session, SessionUser, SignUpOutcome, SignUpProfile};

/// Failure reported by a store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the request (bad credentials, duplicate account, ...).
    /// The message is safe to show to the user.
    #[error("{0}")]
    Rejected(String),

    /// The presented token is missing, expired or revoked.
    #[error("session is invalid or expired")]
    InvalidSession,

    /// The account exists but its email address has not been confirmed.
    #[error("email not confirmed")]
    EmailNotConfirmed,

    /// The store could not be reached or timed out. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    /// Whether a caller may retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Identity provider: password sign-in, registration and token lifecycle.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, StoreError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, StoreError>;

    /// Revoke the session behind `access_token`.
    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError>;

    /// Resolve the user behind a token. Returns `InvalidSession` when the
    /// token is no longer accepted.
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, StoreError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError>;

    /// Send a password-reset email that links back to `redirect_to`.
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), StoreError>;

    /// URL that starts a third-party sign-in with `provider`.
    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, StoreError>;
}

/// Relational store holding the `correspondence` and `activity_log` tables.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records matching `query`, in the order it requests.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<CorrespondenceRecord>, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<CorrespondenceRecord>, StoreError>;

    async fn insert(&self, record: NewCorrespondence) -> Result<CorrespondenceRecord, StoreError>;

    /// Apply a status change. Returns `None` when the record does not exist.
    async fn update_status(
        &self,
        id: Uuid,
        change: StatusChange,
    ) -> Result<Option<CorrespondenceRecord>, StoreError>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn insert_activity(&self, entry: NewActivity) -> Result<ActivityLogEntry, StoreError>;

    /// Entries for one record, newest first.
    async fn list_activity(
        &self,
        correspondence_id: &str,
    ) -> Result<Vec<ActivityLogEntry>, StoreError>;
}
