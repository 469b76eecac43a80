//! Session store backed by a GoTrue-compatible identity service.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cms_common::session::{Session, SessionUser, SignUpOutcome, SignUpProfile};
use cms_common::store::{SessionStore, StoreError};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Providers accepted for third-party sign-in.
pub const OAUTH_PROVIDERS: [&str; 2] = ["google", "github"];

#[derive(Clone)]
pub struct GoTrueSessionStore {
    client: reqwest::Client,
    base_url: String,
}

impl GoTrueSessionStore {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key)
            .map_err(|e| StoreError::Internal(format!("invalid anon key header value: {e}")))?;
        headers.insert("apikey", key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| StoreError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(status = %status, "Identity service responded");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Internal(format!("unexpected identity response: {e}")))
    }
}

#[derive(Deserialize)]
struct UserDto {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    user_metadata: Value,
}

impl From<UserDto> for SessionUser {
    fn from(dto: UserDto) -> Self {
        let full_name = dto
            .user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id: dto.id,
            email: dto.email.unwrap_or_default(),
            email_confirmed: dto.email_confirmed_at.or(dto.confirmed_at).is_some(),
            full_name,
        }
    }
}

#[derive(Deserialize)]
struct SessionDto {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserDto,
}

impl From<SessionDto> for Session {
    fn from(dto: SessionDto) -> Self {
        let expires_at = dto
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(dto.expires_in.unwrap_or(3600)));
        Self {
            access_token: dto.access_token,
            refresh_token: dto.refresh_token,
            user: dto.user.into(),
            expires_at,
        }
    }
}

/// `/signup` answers with a session when the account is auto-confirmed and
/// with the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(SessionDto),
    User(UserDto),
}

#[derive(Deserialize, Default)]
struct ErrorDto {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

fn transport_error(e: reqwest::Error) -> StoreError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Internal(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> StoreError {
    let dto: ErrorDto = serde_json::from_str(body).unwrap_or_default();
    if dto.error_code.as_deref() == Some("email_not_confirmed") {
        return StoreError::EmailNotConfirmed;
    }
    let message = dto
        .msg
        .or(dto.error_description)
        .or(dto.message)
        .unwrap_or_else(|| format!("identity service returned {status}"));

    match status.as_u16() {
        401 | 403 => StoreError::InvalidSession,
        429 | 500..=599 => StoreError::Unavailable(message),
        _ => StoreError::Rejected(message),
    }
}

#[async_trait]
impl SessionStore for GoTrueSessionStore {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, StoreError> {
        let request = self
            .client
            .post(self.url("/token"))
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password });
        let dto: SessionDto = self.send_json(request).await?;
        Ok(dto.into())
    }

    #[instrument(skip(self, password, profile))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, StoreError> {
        let request = self.client.post(self.url("/signup")).json(&json!({
            "email": email,
            "password": password,
            "data": {
                "full_name": profile.full_name,
                "phone": profile.phone,
            },
        }));
        Ok(match self.send_json::<SignUpResponse>(request).await? {
            SignUpResponse::Session(dto) => SignUpOutcome::SignedIn(dto.into()),
            SignUpResponse::User(dto) => SignUpOutcome::ConfirmationRequired(dto.into()),
        })
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        let request = self
            .client
            .post(self.url("/logout"))
            .bearer_auth(access_token);
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, StoreError> {
        let request = self.client.get(self.url("/user")).bearer_auth(access_token);
        let dto: UserDto = self.send_json(request).await?;
        Ok(dto.into())
    }

    #[instrument(skip_all)]
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError> {
        let request = self
            .client
            .post(self.url("/token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        match self.send_json::<SessionDto>(request).await {
            Err(StoreError::Rejected(_)) => Err(StoreError::InvalidSession),
            other => other.map(Session::from),
        }
    }

    #[instrument(skip(self))]
    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .post(self.url("/recover"))
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip_all)]
    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        let request = self
            .client
            .put(self.url("/user"))
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }));
        self.send(request).await.map(|_| ())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, StoreError> {
        if !OAUTH_PROVIDERS.contains(&provider) {
            return Err(StoreError::Rejected(format!(
                "Unsupported provider '{provider}'"
            )));
        }
        let url = reqwest::Url::parse_with_params(
            &self.url("/authorize"),
            &[("provider", provider), ("redirect_to", redirect_to)],
        )
        .map_err(|e| StoreError::Internal(format!("invalid identity URL: {e}")))?;
        Ok(url.into())
    }
}
