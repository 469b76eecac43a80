use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use cms_common::session::{AuthState, SignUpOutcome};
use futures::stream::{self, Stream, StreamExt};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, PresentedToken};
use crate::extractors::validated::AppJson;
use crate::models::auth::{
    AuthResponse, ForgotPasswordRequest, MessageResponse, OAuthCallbackRequest,
    OAuthUrlResponse, RefreshRequest, SessionResponse, SignInRequest, SignUpRequest,
    SignUpResponse, UpdatePasswordRequest,
};
use crate::services::auth::AuthService;
use crate::state::AppState;
use crate::utils::cookies;

#[utoipa::path(
    post,
    path = "/sign-in",
    tag = "Auth",
    operation_id = "signIn",
    summary = "Sign in with email and password",
    description = "Validates the input locally, then signs in against the session store, retrying \
        transient failures. Sets the session cookies; they persist across browser restarts only \
        with `remember_me`.",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong email or password (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 403, description = "Email not confirmed (EMAIL_NOT_CONFIRMED)", body = ErrorBody),
        (status = 503, description = "Session store unreachable (UPSTREAM_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload), fields(email = %payload.email))]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<SignInRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = AuthService::new(&state)
        .sign_in(&payload.email, &payload.password)
        .await?;
    let jar = cookies::store_session(jar, &session, payload.remember_me);
    Ok((jar, Json(AuthResponse::from(&session))))
}

#[utoipa::path(
    post,
    path = "/sign-up",
    tag = "Auth",
    operation_id = "signUp",
    summary = "Register a new account",
    description = "Creates an account in the session store. Most stores email a confirmation link \
        and do not sign the user in; stores that confirm immediately return a session and set \
        the session cookies.",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = SignUpResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Registration refused (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, jar, payload), fields(email = %payload.email))]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = AuthService::new(&state).sign_up(&payload).await?;
    let (jar, body) = match outcome {
        SignUpOutcome::ConfirmationRequired(user) => (
            jar,
            SignUpResponse {
                confirmation_required: true,
                message: format!(
                    "Registration successful. Check {} for a confirmation link.",
                    user.email
                ),
                session: None,
            },
        ),
        SignUpOutcome::SignedIn(session) => (
            cookies::store_session(jar, &session, false),
            SignUpResponse {
                confirmation_required: false,
                message: "Registration successful.".into(),
                session: Some(AuthResponse::from(&session)),
            },
        ),
    };
    Ok((StatusCode::CREATED, jar, Json(body)))
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "Auth",
    operation_id = "forgotPassword",
    summary = "Send a password reset email",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email requested", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Session store unreachable (UPSTREAM_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    AuthService::new(&state)
        .forgot_password(&payload.email)
        .await?;
    Ok(Json(MessageResponse::new(
        "If an account exists for this email, a password reset link has been sent.",
    )))
}

#[utoipa::path(
    get,
    path = "/session",
    tag = "Auth",
    operation_id = "getSession",
    summary = "Resolve the current session",
    description = "Checks the presented token with the session store. When no usable session \
        exists the session cookies are cleared.",
    responses(
        (status = 200, description = "Current authentication state", body = SessionResponse),
        (status = 503, description = "Session store unreachable (UPSTREAM_UNAVAILABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn session(
    State(state): State<AppState>,
    jar: CookieJar,
    PresentedToken(token): PresentedToken,
) -> Result<(CookieJar, Json<SessionResponse>), AppError> {
    let refresh = cookies::refresh_token(&jar);
    let auth_state = AuthService::new(&state)
        .bootstrap(token.as_deref(), refresh)
        .await?;
    let jar = match auth_state {
        AuthState::Authenticated(_) => jar,
        _ => cookies::clear_session(jar),
    };
    Ok((jar, Json(SessionResponse::from(&auth_state))))
}

#[utoipa::path(
    post,
    path = "/sign-out",
    tag = "Auth",
    operation_id = "signOut",
    summary = "Sign out",
    description = "Revokes the session remotely when possible and always clears the session cookies.",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
    ),
)]
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
    PresentedToken(token): PresentedToken,
) -> (CookieJar, Json<MessageResponse>) {
    AuthService::new(&state).sign_out(token.as_deref()).await;
    (
        cookies::clear_session(jar),
        Json(MessageResponse::new("Signed out")),
    )
}

#[utoipa::path(
    post,
    path = "/refresh",
    tag = "Auth",
    operation_id = "refreshSession",
    summary = "Exchange a refresh token for a new session",
    description = "Uses `refresh_token` from the body, or the refresh cookie when absent.",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New session", body = AuthResponse),
        (status = 401, description = "Refresh token missing or rejected (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<RefreshRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let token = payload
        .refresh_token
        .or_else(|| cookies::refresh_token(&jar))
        .ok_or(AppError::TokenMissing)?;
    let session = AuthService::new(&state).refresh(&token).await?;
    let jar = cookies::store_session(jar, &session, payload.remember_me);
    Ok((jar, Json(AuthResponse::from(&session))))
}

#[utoipa::path(
    put,
    path = "/password",
    tag = "Auth",
    operation_id = "updatePassword",
    summary = "Change the signed-in user's password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = %auth_user.user_id))]
pub async fn update_password(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    AuthService::new(&state)
        .update_password(&auth_user.token, &payload.password, &payload.confirm_password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "Auth",
    operation_id = "sessionEvents",
    summary = "Stream session state changes",
    description = "Server-sent events carrying the caller's authentication state: the current \
        state first, then every change (sign-in elsewhere, sign-out, expiry) until the client \
        disconnects.",
    responses(
        (status = 200, description = "Event stream of SessionResponse payloads", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn events(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Subscribe first so the context outlives the bootstrap below.
    let mut subscription = state.sessions.subscribe(auth_user.user_id);
    if matches!(subscription.current(), AuthState::Unchecked) {
        AuthService::new(&state)
            .bootstrap(Some(&auth_user.token), None)
            .await?;
    }

    let initial = subscription.current();
    let changes = stream::unfold(subscription, |mut subscription| async move {
        subscription
            .changed()
            .await
            .map(|state| (state, subscription))
    });

    let stream = stream::once(async move { initial })
        .chain(changes)
        .map(|auth_state| Ok(session_event(&auth_state)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn session_event(auth_state: &AuthState) -> Event {
    let payload = SessionResponse::from(auth_state);
    Event::default()
        .event("session")
        .json_data(&payload)
        .unwrap_or_else(|_| Event::default().event("session").data(auth_state.name()))
}

#[utoipa::path(
    get,
    path = "/oauth/{provider}",
    tag = "Auth",
    operation_id = "oauthUrl",
    summary = "Start a third-party sign-in",
    params(("provider" = String, Path, description = "`google` or `github`")),
    responses(
        (status = 200, description = "Authorization URL", body = OAuthUrlResponse),
        (status = 400, description = "Unsupported provider (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn oauth_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<OAuthUrlResponse>, AppError> {
    let url = AuthService::new(&state).oauth_url(&provider)?;
    Ok(Json(OAuthUrlResponse { url }))
}

#[utoipa::path(
    post,
    path = "/oauth/callback",
    tag = "Auth",
    operation_id = "oauthCallback",
    summary = "Finish a third-party sign-in",
    description = "Accepts the token pair from the provider redirect, verifies it with the \
        session store and sets the session cookies.",
    request_body = OAuthCallbackRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Token rejected (TOKEN_INVALID)", body = ErrorBody),
    ),
)]
#[instrument(skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<OAuthCallbackRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let session = AuthService::new(&state)
        .complete_oauth(&payload.access_token, payload.refresh_token)
        .await?;
    let jar = cookies::store_session(jar, &session, payload.remember_me);
    Ok((jar, Json(AuthResponse::from(&session))))
}
