use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity attached to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    #[schema(example = "clerk@audit.gov")]
    pub email: String,
    /// `false` until the user follows the confirmation link.
    pub email_confirmed: bool,
    pub full_name: Option<String>,
}

/// Credentials issued by the session store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Seconds until expiry, clamped at zero.
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Profile data captured at registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpProfile {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Result of a registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The store sent a confirmation email; the user is not signed in.
    ConfirmationRequired(SessionUser),
    /// The store auto-confirmed the account and issued a session.
    SignedIn(Session),
}

/// Where a client stands in the authentication loop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unchecked,
    Checking,
    Authenticated(Session),
    Unauthenticated,
}

/// Inputs that drive [`AuthState`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// A session lookup or sign-in attempt started.
    Check,
    /// The lookup produced a valid session.
    Found(Session),
    /// The lookup failed or found nothing.
    Missing,
    SignedOut,
    Expired,
}

/// The event is not valid in the current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} while {state}")]
pub struct InvalidTransition {
    pub state: &'static str,
    pub event: &'static str,
}

impl AuthState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::Checking => "checking",
            Self::Authenticated(_) => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Compute the next state.
    ///
    /// `unchecked → checking → {authenticated, unauthenticated}`,
    /// `authenticated → unauthenticated` on sign-out or expiry, and
    /// `unauthenticated → checking` to start over. An authenticated state
    /// accepts a newer session in place.
    pub fn transition(&self, event: AuthEvent) -> Result<AuthState, InvalidTransition> {
        match (self, event) {
            (Self::Unchecked | Self::Unauthenticated, AuthEvent::Check) => Ok(Self::Checking),
            (Self::Checking, AuthEvent::Found(session)) => Ok(Self::Authenticated(session)),
            (Self::Checking, AuthEvent::Missing) => Ok(Self::Unauthenticated),
            (Self::Authenticated(_), AuthEvent::Found(session)) => {
                Ok(Self::Authenticated(session))
            }
            (Self::Authenticated(_), AuthEvent::SignedOut | AuthEvent::Expired) => {
                Ok(Self::Unauthenticated)
            }
            (state, event) => Err(InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Found(_) => "found",
            Self::Missing => "missing",
            Self::SignedOut => "signed-out",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
