use chrono::{DateTime, Utc};
use cms_common::session::{AuthState, Session, SessionUser, SignUpProfile};
use serde::{Deserialize, Serialize};

/// Where the client should go after a successful sign-in.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Request body for password sign-in.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignInRequest {
    #[schema(example = "clerk@audit.gov")]
    pub email: String,
    /// At least 6 characters.
    #[schema(example = "s3cure!")]
    pub password: String,
    /// Keep the session cookies across browser restarts.
    #[serde(default)]
    pub remember_me: bool,
}

/// Request body for registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignUpRequest {
    #[schema(example = "clerk@audit.gov")]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Takes precedence over `first_name` / `last_name`.
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl SignUpRequest {
    pub fn profile(&self) -> SignUpProfile {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let full_name = non_blank(&self.full_name).or_else(|| {
            let joined = [non_blank(&self.first_name), non_blank(&self.last_name)]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        });
        SignUpProfile {
            full_name,
            phone: non_blank(&self.phone),
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ForgotPasswordRequest {
    #[schema(example = "clerk@audit.gov")]
    pub email: String,
}

/// Request body for changing the signed-in user's password.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdatePasswordRequest {
    /// At least 8 characters.
    pub password: String,
    pub confirm_password: String,
}

/// Refresh token to exchange. Falls back to the refresh cookie when absent.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

/// Token pair handed back by a third-party sign-in redirect.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct OAuthCallbackRequest {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub remember_me: bool,
}

/// Successful sign-in.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    /// Bearer token for API clients that do not use cookies.
    pub access_token: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
    #[schema(example = "/dashboard")]
    pub redirect_to: String,
}

impl From<&Session> for AuthResponse {
    fn from(session: &Session) -> Self {
        Self {
            access_token: session.access_token.clone(),
            user: session.user.clone(),
            expires_at: session.expires_at,
            redirect_to: DASHBOARD_PATH.to_string(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SignUpResponse {
    /// `true` when the user must follow an emailed link before signing in.
    pub confirmation_required: bool,
    pub message: String,
    /// Present when the account was confirmed immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<AuthResponse>,
}

/// Snapshot of the caller's authentication state.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub authenticated: bool,
    /// One of `unchecked`, `checking`, `authenticated`, `unauthenticated`.
    #[schema(example = "authenticated")]
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl From<&AuthState> for SessionResponse {
    fn from(state: &AuthState) -> Self {
        let session = state.session();
        Self {
            authenticated: state.is_authenticated(),
            state: state.name(),
            user: session.map(|s| s.user.clone()),
            expires_at: session.map(|s| s.expires_at),
            redirect_to: session.map(|_| DASHBOARD_PATH.to_string()),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct OAuthUrlResponse {
    /// Provider authorization URL to redirect the browser to.
    pub url: String,
}
