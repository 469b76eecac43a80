use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::{cookies, jwt};

/// Authenticated user extracted from `Authorization: Bearer <token>`, or from
/// the session cookie when the header is absent.
///
/// Add this as a handler parameter to require authentication. Tokens of a
/// user who has since signed out are refused.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    /// The raw access token, for calls that act on the user's behalf.
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Access token presented with the request, if any.
pub fn presented_token(parts: &Parts) -> Result<Option<String>, AppError> {
    if let Some(header) = parts.headers.get("Authorization") {
        let value = header.to_str().map_err(|_| AppError::TokenInvalid)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;
        return Ok(Some(token.to_string()));
    }
    Ok(cookies::access_token(&CookieJar::from_headers(&parts.headers)))
}

impl AuthUser {
    pub fn from_token(token: String, secret: &str) -> Result<Self, AppError> {
        let claims = jwt::verify(&token, secret).map_err(|_| AppError::TokenInvalid)?;
        let user_id = claims.user_id().map_err(|_| AppError::TokenInvalid)?;
        Ok(AuthUser {
            user_id,
            expires_at: claims.expires_at(),
            email: claims.email,
            token,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = presented_token(parts)?.ok_or(AppError::TokenMissing)?;
        let user = AuthUser::from_token(token, &state.config.auth.jwt_secret)?;
        if state.sessions.is_closed(user.user_id) {
            return Err(AppError::TokenInvalid);
        }
        Ok(user)
    }
}

/// Whatever token the request carries, without requiring one.
pub struct PresentedToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for PresentedToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PresentedToken(presented_token(parts)?))
    }
}
