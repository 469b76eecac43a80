//! Per-user session context shared by every request and event stream.
//!
//! Handlers never cache session state themselves. They drive a user's
//! [`SessionContext`] through the [`AuthState`] machine and readers observe it
//! through a [`SessionSubscription`], which releases itself on drop.
//!
//! A signed-out user leaves a closure mark behind until the signed-out
//! token would have expired. Request authentication consults it, so a token that
//! still verifies is refused after sign-out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use cms_common::session::{AuthEvent, AuthState, InvalidTransition, Session};
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Authentication state of one user, plus the timer that expires it.
pub struct SessionContext {
    user_id: Uuid,
    state: watch::Sender<AuthState>,
    /// Bumped whenever a session is installed or removed. An expiry timer only
    /// fires for the generation it was armed for.
    generation: AtomicU64,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    fn new(user_id: Uuid) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            user_id,
            state,
            generation: AtomicU64::new(0),
            expiry: Mutex::new(None),
        }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    fn apply(&self, event: AuthEvent) -> Result<(), InvalidTransition> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match state.transition(event) {
            Ok(next) => {
                debug!(user_id = %self.user_id, from = %state, to = %next, "Session transition");
                *state = next;
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Drive the machine to `Authenticated(session)` from any state.
    fn authenticate(&self, session: Session) {
        if matches!(self.current(), AuthState::Unchecked | AuthState::Unauthenticated) {
            let _ = self.apply(AuthEvent::Check);
        }
        let _ = self.apply(AuthEvent::Found(session));
    }

    /// Drive the machine to `Unauthenticated`, using `event` when leaving an
    /// authenticated state.
    fn deauthenticate(&self, event: AuthEvent) {
        match self.current() {
            AuthState::Authenticated(_) => {
                let _ = self.apply(event);
            }
            AuthState::Checking => {
                let _ = self.apply(AuthEvent::Missing);
            }
            AuthState::Unchecked => {
                let _ = self.apply(AuthEvent::Check);
                let _ = self.apply(AuthEvent::Missing);
            }
            AuthState::Unauthenticated => {}
        }
    }

    fn lock_expiry(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.expiry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn disarm(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.lock_expiry().take() {
            handle.abort();
        }
    }

    fn arm(self: &Arc<Self>, session: &Session, contexts: Weak<Contexts>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            if ctx.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            debug!(user_id = %ctx.user_id, "Session expired");
            ctx.deauthenticate(AuthEvent::Expired);
            if let Some(contexts) = contexts.upgrade() {
                prune_idle(&contexts, ctx.user_id);
            }
        });

        if let Some(previous) = self.lock_expiry().replace(handle) {
            previous.abort();
        }
    }

    fn is_idle(&self) -> bool {
        self.state.receiver_count() == 0 && !self.state.borrow().is_authenticated()
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_expiry().take() {
            handle.abort();
        }
    }
}

type Contexts = DashMap<Uuid, Arc<SessionContext>>;

fn prune_idle(contexts: &Contexts, user_id: Uuid) {
    contexts.remove_if(&user_id, |_, ctx| ctx.is_idle());
}

/// Registry of session contexts keyed by user id.
#[derive(Clone, Default)]
pub struct SessionHub {
    contexts: Arc<Contexts>,
    /// Users whose sessions were closed, until the closed token would expire.
    closed: Arc<DashMap<Uuid, DateTime<Utc>>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self, user_id: Uuid) -> Arc<SessionContext> {
        self.contexts
            .entry(user_id)
            .or_insert_with(|| Arc::new(SessionContext::new(user_id)))
            .clone()
    }

    fn prune(&self, user_id: Uuid) {
        prune_idle(&self.contexts, user_id);
    }

    fn close(&self, user_id: Uuid, until: DateTime<Utc>) {
        if until <= Utc::now() {
            return;
        }
        self.closed
            .entry(user_id)
            .and_modify(|current| *current = (*current).max(until))
            .or_insert(until);
    }

    /// Whether `user_id` signed out since their last successful
    /// authentication.
    pub fn is_closed(&self, user_id: Uuid) -> bool {
        let now = Utc::now();
        if self.closed.remove_if(&user_id, |_, until| *until <= now).is_some() {
            return false;
        }
        self.closed.contains_key(&user_id)
    }

    /// Current state for `user_id`. Unknown users are `Unchecked`.
    pub fn state(&self, user_id: Uuid) -> AuthState {
        self.contexts
            .get(&user_id)
            .map(|ctx| ctx.current())
            .unwrap_or_default()
    }

    /// Install `session` as the user's live session and arm its expiry timer.
    /// A newer session replaces an older one.
    pub fn authenticate(&self, session: &Session) {
        self.closed.remove(&session.user.id);
        let ctx = self.context(session.user.id);
        ctx.authenticate(session.clone());
        ctx.arm(session, Arc::downgrade(&self.contexts));
    }

    /// Record that a session check for `user_id` found nothing usable.
    pub fn reject(&self, user_id: Uuid) {
        if let Some(ctx) = self.contexts.get(&user_id).map(|c| c.clone()) {
            ctx.disarm();
            ctx.deauthenticate(AuthEvent::Expired);
        }
        self.prune(user_id);
    }

    /// End `user_id`'s session. The user's tokens are refused until `until`
    /// or their next successful authentication, whichever comes first.
    pub fn sign_out(&self, user_id: Uuid, until: DateTime<Utc>) {
        self.close(user_id, until);
        if let Some(ctx) = self.contexts.get(&user_id).map(|c| c.clone()) {
            ctx.disarm();
            ctx.deauthenticate(AuthEvent::SignedOut);
        }
        self.prune(user_id);
    }

    /// Watch `user_id`'s state until the returned guard is dropped.
    pub fn subscribe(&self, user_id: Uuid) -> SessionSubscription {
        let ctx = self.context(user_id);
        SessionSubscription {
            receiver: Some(ctx.state.subscribe()),
            user_id,
            hub: self.clone(),
        }
    }

    /// Number of users with a live context.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Scoped view of one user's [`AuthState`].
///
/// Dropping the subscription unsubscribes and lets the hub forget idle
/// contexts.
pub struct SessionSubscription {
    receiver: Option<watch::Receiver<AuthState>>,
    user_id: Uuid,
    hub: SessionHub,
}

impl SessionSubscription {
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// The state as of now, marking it seen.
    pub fn current(&mut self) -> AuthState {
        match self.receiver.as_mut() {
            Some(rx) => rx.borrow_and_update().clone(),
            None => AuthState::default(),
        }
    }

    /// Wait for the next state change. Returns `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<AuthState> {
        let rx = self.receiver.as_mut()?;
        rx.changed().await.ok()?;
        Some(rx.borrow_and_update().clone())
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        drop(self.receiver.take());
        self.hub.prune(self.user_id);
    }
}
