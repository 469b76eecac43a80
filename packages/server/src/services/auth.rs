//! Sign-in, registration and session lifecycle on behalf of the caller.

use std::sync::Arc;

use chrono::Utc;
use cms_common::retry::RetryPolicy;
use cms_common::session::{AuthState, Session, SignUpOutcome};
use cms_common::store::{SessionStore, StoreError};
use cms_common::validation::{
    MIN_NEW_PASSWORD_LEN, MIN_PASSWORD_LEN, is_valid_email, validate_credentials,
    validate_new_password,
};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::auth::SignUpRequest;
use crate::session::SessionHub;
use crate::state::AppState;
use crate::utils::jwt;

pub struct AuthService {
    store: Arc<dyn SessionStore>,
    hub: SessionHub,
    retry: RetryPolicy,
    jwt_secret: String,
    reset_redirect: String,
    oauth_redirect: String,
}

impl AuthService {
    pub fn new(state: &AppState) -> Self {
        let auth = &state.config.auth;
        Self {
            store: state.auth.clone(),
            hub: state.sessions.clone(),
            retry: auth.retry_policy(),
            jwt_secret: auth.jwt_secret.clone(),
            reset_redirect: auth.reset_password_url(),
            oauth_redirect: auth.oauth_callback_url(),
        }
    }

    /// Password sign-in. Input is validated before the store is contacted and
    /// transient store failures are retried.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        validate_credentials(email, password).map_err(AppError::Validation)?;
        let email = email.trim();

        let session = self
            .retry
            .run("sign_in", || self.store.sign_in_with_password(email, password))
            .await?;

        if !session.user.email_confirmed {
            if let Err(e) = self.store.sign_out(&session.access_token).await {
                warn!(error = %e, "Failed to revoke session of unconfirmed user");
            }
            return Err(AppError::EmailNotConfirmed);
        }

        self.hub.authenticate(&session);
        info!(user_id = %session.user.id, "User signed in");
        Ok(session)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, AppError> {
        let email = request.email.trim();
        if !is_valid_email(email) {
            return Err(AppError::Validation("Enter a valid email address".into()));
        }
        validate_new_password(&request.password, &request.confirm_password, MIN_PASSWORD_LEN)
            .map_err(AppError::Validation)?;

        let outcome = self
            .store
            .sign_up(email, &request.password, &request.profile())
            .await
            .map_err(|e| match e {
                StoreError::Rejected(msg) => AppError::Validation(msg),
                other => other.into(),
            })?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.hub.authenticate(session);
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AppError::Validation("Enter a valid email address".into()));
        }
        self.store
            .reset_password_for_email(email, Some(&self.reset_redirect))
            .await
            .map_err(|e| match e {
                StoreError::Rejected(msg) => AppError::Validation(msg),
                other => other.into(),
            })
    }

    /// Resolve the caller's cached token into an authentication state.
    ///
    /// A token that does not verify locally is treated as absent without
    /// asking the store. A token the store no longer accepts moves the user's
    /// context to `Unauthenticated`. Store outages surface as errors so the
    /// caller keeps its cache.
    #[instrument(skip_all)]
    pub async fn bootstrap(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<String>,
    ) -> Result<AuthState, AppError> {
        let Some(token) = access_token else {
            return Ok(AuthState::Unauthenticated);
        };
        let Ok(claims) = jwt::verify(token, &self.jwt_secret) else {
            return Ok(AuthState::Unauthenticated);
        };
        let (Ok(user_id), Some(expires_at)) = (claims.user_id(), claims.expires_at()) else {
            return Ok(AuthState::Unauthenticated);
        };

        match self
            .retry
            .run("get_user", || self.store.get_user(token))
            .await
        {
            Ok(user) => {
                let session = Session {
                    access_token: token.to_string(),
                    refresh_token,
                    user,
                    expires_at,
                };
                self.hub.authenticate(&session);
                Ok(AuthState::Authenticated(session))
            }
            Err(StoreError::InvalidSession | StoreError::Rejected(_)) => {
                self.hub.reject(user_id);
                Ok(AuthState::Unauthenticated)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sign out remotely when possible. Remote failures are logged only.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: Option<&str>) {
        let Some(token) = access_token else {
            return;
        };
        if let Err(e) = self.store.sign_out(token).await {
            warn!(error = %e, "Remote sign-out failed; clearing local session anyway");
        }
        let Ok(claims) = jwt::verify(token, &self.jwt_secret) else {
            return;
        };
        if let Ok(user_id) = claims.user_id() {
            let until = claims.expires_at().unwrap_or_else(Utc::now);
            self.hub.sign_out(user_id, until);
        }
    }

    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AppError> {
        let session = self
            .retry
            .run("refresh_session", || self.store.refresh_session(refresh_token))
            .await?;
        self.hub.authenticate(&session);
        Ok(session)
    }

    #[instrument(skip_all)]
    pub async fn update_password(
        &self,
        access_token: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), AppError> {
        validate_new_password(password, confirm, MIN_NEW_PASSWORD_LEN)
            .map_err(AppError::Validation)?;
        self.store
            .update_user_password(access_token, password)
            .await
            .map_err(|e| match e {
                StoreError::Rejected(msg) => AppError::Validation(msg),
                other => other.into(),
            })
    }

    pub fn oauth_url(&self, provider: &str) -> Result<String, AppError> {
        self.store
            .authorize_url(provider, &self.oauth_redirect)
            .map_err(|e| match e {
                StoreError::Rejected(msg) => AppError::Validation(msg),
                other => other.into(),
            })
    }

    /// Adopt a token pair issued by a third-party sign-in.
    #[instrument(skip_all)]
    pub async fn complete_oauth(
        &self,
        access_token: &str,
        refresh_token: Option<String>,
    ) -> Result<Session, AppError> {
        match self.bootstrap(Some(access_token), refresh_token).await? {
            AuthState::Authenticated(session) => Ok(session),
            _ => Err(AppError::TokenInvalid),
        }
    }
}
