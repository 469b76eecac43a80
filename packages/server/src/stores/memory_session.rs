//! In-process session store for development and tests.
//!
//! Issues real access tokens signed with the configured secret so the rest of
//! the stack verifies them exactly as it verifies tokens from the hosted
//! service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use cms_common::session::{Session, SessionUser, SignUpOutcome, SignUpProfile};
use cms_common::store::{SessionStore, StoreError};
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::utils::jwt;

#[derive(Clone)]
struct Account {
    id: Uuid,
    email: String,
    password: String,
    confirmed: bool,
    full_name: Option<String>,
}

impl Account {
    fn user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.clone(),
            email_confirmed: self.confirmed,
            full_name: self.full_name.clone(),
        }
    }
}

pub struct MemorySessionStore {
    secret: String,
    ttl: Duration,
    auto_confirm: bool,
    accounts: DashMap<String, Account>,
    refresh_tokens: DashMap<String, Uuid>,
    revoked: DashSet<String>,
    reset_requests: DashMap<String, Option<String>>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemorySessionStore {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
            auto_confirm: false,
            accounts: DashMap::new(),
            refresh_tokens: DashMap::new(),
            revoked: DashSet::new(),
            reset_requests: DashMap::new(),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Confirm new accounts immediately and sign them in.
    pub fn with_auto_confirm(mut self) -> Self {
        self.auto_confirm = true;
        self
    }

    /// Create an account directly, bypassing sign-up.
    pub fn add_user(&self, email: &str, password: &str, confirmed: bool) -> Uuid {
        let id = Uuid::now_v7();
        self.accounts.insert(
            email.to_lowercase(),
            Account {
                id,
                email: email.to_string(),
                password: password.to_string(),
                confirmed,
                full_name: None,
            },
        );
        id
    }

    pub fn confirm(&self, email: &str) {
        if let Some(mut account) = self.accounts.get_mut(&email.to_lowercase()) {
            account.confirmed = true;
        }
    }

    /// Number of store operations attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fail the next `n` operations with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Redirect target of the last reset request for `email`, if any.
    pub fn reset_redirect(&self, email: &str) -> Option<Option<String>> {
        self.reset_requests
            .get(&email.to_lowercase())
            .map(|r| r.value().clone())
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.accounts
            .get(&email.to_lowercase())
            .map(|a| a.password.clone())
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("session store offline".into()));
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn issue(&self, account: &Account) -> Result<Session, StoreError> {
        let access_token = jwt::sign(account.id, &account.email, self.ttl, &self.secret)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let expires_at = jwt::verify(&access_token, &self.secret)
            .ok()
            .and_then(|claims| claims.expires_at())
            .unwrap_or_else(|| Utc::now() + self.ttl);
        let refresh_token = Uuid::new_v4().simple().to_string();
        self.refresh_tokens.insert(refresh_token.clone(), account.id);
        Ok(Session {
            access_token,
            refresh_token: Some(refresh_token),
            user: account.user(),
            expires_at,
        })
    }

    fn account_by_id(&self, id: Uuid) -> Option<Account> {
        self.accounts
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value().clone())
    }

    fn account_for_token(&self, access_token: &str) -> Result<Account, StoreError> {
        if self.revoked.contains(access_token) {
            return Err(StoreError::InvalidSession);
        }
        let claims =
            jwt::verify(access_token, &self.secret).map_err(|_| StoreError::InvalidSession)?;
        let id = claims.user_id().map_err(|_| StoreError::InvalidSession)?;
        self.account_by_id(id).ok_or(StoreError::InvalidSession)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, StoreError> {
        self.enter()?;
        let account = self
            .accounts
            .get(&email.to_lowercase())
            .map(|a| a.value().clone())
            .filter(|a| a.password == password)
            .ok_or_else(|| StoreError::Rejected("Invalid login credentials".into()))?;
        if !account.confirmed {
            return Err(StoreError::EmailNotConfirmed);
        }
        self.issue(&account)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        profile: &SignUpProfile,
    ) -> Result<SignUpOutcome, StoreError> {
        self.enter()?;
        let key = email.to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(StoreError::Rejected("User already registered".into()));
        }
        let account = Account {
            id: Uuid::now_v7(),
            email: email.to_string(),
            password: password.to_string(),
            confirmed: self.auto_confirm,
            full_name: profile.full_name.clone(),
        };
        self.accounts.insert(key, account.clone());
        if self.auto_confirm {
            Ok(SignUpOutcome::SignedIn(self.issue(&account)?))
        } else {
            Ok(SignUpOutcome::ConfirmationRequired(account.user()))
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), StoreError> {
        self.enter()?;
        let account = self.account_for_token(access_token)?;
        self.revoked.insert(access_token.to_string());
        self.refresh_tokens.retain(|_, user| *user != account.id);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<SessionUser, StoreError> {
        self.enter()?;
        Ok(self.account_for_token(access_token)?.user())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, StoreError> {
        self.enter()?;
        let (_, user_id) = self
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(StoreError::InvalidSession)?;
        let account = self
            .account_by_id(user_id)
            .ok_or(StoreError::InvalidSession)?;
        self.issue(&account)
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), StoreError> {
        self.enter()?;
        // Unknown addresses succeed silently so callers cannot probe accounts.
        self.reset_requests
            .insert(email.to_lowercase(), redirect_to.map(str::to_string));
        Ok(())
    }

    async fn update_user_password(
        &self,
        access_token: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        self.enter()?;
        let account = self.account_for_token(access_token)?;
        if let Some(mut entry) = self.accounts.get_mut(&account.email.to_lowercase()) {
            entry.password = new_password.to_string();
        }
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str) -> Result<String, StoreError> {
        if !super::gotrue::OAUTH_PROVIDERS.contains(&provider) {
            return Err(StoreError::Rejected(format!(
                "Unsupported provider '{provider}'"
            )));
        }
        Ok(format!(
            "memory://authorize?provider={provider}&redirect_to={redirect_to}"
        ))
    }
}
