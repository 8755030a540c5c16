//! The session lifecycle engine.
//!
//! `AuthEngine` owns the single current session. All state lives behind one
//! short-held lock that is never held across a remote call: operations read
//! what they need, release the lock, talk to the provider, then re-take the
//! lock to apply the result.
//!
//! A generation counter is bumped on every adoption and every clear. An
//! operation that captured an older generation before its remote call
//! discards its result with [`AuthError::Superseded`] instead of overwriting
//! newer state. A second counter tracks identity: it moves on sign-in,
//! redirect, recovery and clear, but not on refresh, so a user update only
//! loses to a change of who is signed in.
//!
//! Refreshes are coalesced: while one is in flight, every further request
//! (explicit or timer-driven) joins it and observes the same outcome.

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use gotrue_client::{AuthApi, ClientResult};
use gotrue_types::{
    AuthChangeEvent, Credentials, OtpType, OtpVerification, Provider, ProviderOptions, Session,
    SignUpOptions, SignUpResponse, User, UserAttributes,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use warden_storage::{PersistedSession, SessionStore};

use crate::redirect::RedirectSession;
use crate::registry::{AuthStateCallback, Dispatcher, ObserverRegistry, Subscription};
use crate::timer::RefreshTimer;
use crate::{AuthError, AuthResult, EngineConfig};

type SharedRefresh = Shared<BoxFuture<'static, AuthResult<Session>>>;

/// What started a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Timer,
    Caller,
}

/// Out-of-band reports for failures that do not change auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A refresh failed; the previous session was kept.
    RefreshFailed {
        error: AuthError,
        trigger: RefreshTrigger,
    },
    /// Writing to or removing from the session store failed.
    PersistFailed {
        operation: &'static str,
        message: String,
    },
}

/// Point-in-time view of the engine, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub refreshing: bool,
}

struct InFlightRefresh {
    id: u64,
    future: SharedRefresh,
}

#[derive(Default)]
struct EngineState {
    session: Option<PersistedSession>,
    generation: u64,
    // Unchanged by refresh.
    identity: u64,
    timer: Option<RefreshTimer>,
    timer_generation: u64,
    refresh: Option<InFlightRefresh>,
    next_refresh_id: u64,
}

struct EngineInner {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
    // Lock order: state, then registry.
    state: Mutex<EngineState>,
    registry: Arc<Mutex<ObserverRegistry>>,
    dispatcher: Dispatcher,
    diagnostics: broadcast::Sender<Diagnostic>,
    shutdown: CancellationToken,
}

/// Client-side session manager for a GoTrue-compatible identity provider.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct AuthEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`AuthEngine`].
pub struct AuthEngineBuilder {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
    listeners: Vec<AuthStateCallback>,
}

impl AuthEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an observer before recovery runs, so it sees the recovered session.
    pub fn listener<F>(mut self, callback: F) -> Self
    where
        F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(callback));
        self
    }

    /// Build the engine and recover any persisted session.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> AuthEngine {
        let (diagnostics, _) = broadcast::channel(self.config.diagnostic_capacity.max(1));
        let mut registry = ObserverRegistry::default();
        for listener in self.listeners {
            registry.insert(listener);
        }

        let inner = Arc::new(EngineInner {
            api: self.api,
            store: self.store,
            config: self.config,
            state: Mutex::new(EngineState::default()),
            registry: Arc::new(Mutex::new(registry)),
            dispatcher: Dispatcher::default(),
            diagnostics,
            shutdown: CancellationToken::new(),
        });
        inner.recover();

        AuthEngine { inner }
    }
}

impl AuthEngine {
    pub fn builder(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> AuthEngineBuilder {
        AuthEngineBuilder {
            api,
            store,
            config: EngineConfig::default(),
            listeners: Vec::new(),
        }
    }

    /// Build an engine with the default configuration.
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::builder(api, store).build()
    }

    /// Register an account.
    ///
    /// Any current session is cleared first. When the provider returns a
    /// session (no confirmation required) it is adopted and `SignedIn` is
    /// emitted; a pending user is returned as-is.
    pub async fn sign_up(
        &self,
        credentials: &Credentials,
        options: &SignUpOptions,
    ) -> AuthResult<SignUpResponse> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner.clear_silently();

        let response = inner
            .call("sign_up", inner.api.sign_up(credentials, options))
            .await?;

        match &response {
            SignUpResponse::Session(session) => {
                info!(user_id = %session.user().id, "Signed up");
                inner.adopt_and_notify(session, &[AuthChangeEvent::SignedIn]);
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "Signed up, confirmation pending");
            }
        }
        Ok(response)
    }

    /// Sign in with an email or phone and a password.
    ///
    /// The current session is cleared before the request, so on failure the
    /// engine is left signed out.
    pub async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Session> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner.clear_silently();

        let session = inner
            .call("sign_in", inner.api.sign_in_with_password(credentials))
            .await?;

        info!(user_id = %session.user().id, "Signed in with password");
        inner.adopt_and_notify(&session, &[AuthChangeEvent::SignedIn]);
        Ok(session)
    }

    /// Clear the current session and return the URL that starts a
    /// third-party sign-in. If the URL cannot be built the session is kept. The session arrives later through
    /// [`AuthEngine::session_from_url`].
    pub fn sign_in_with_provider(
        &self,
        provider: Provider,
        options: &ProviderOptions,
    ) -> AuthResult<Url> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let url = inner.api.authorize_url(provider, options)?;
        inner.clear_silently();
        debug!(provider = %provider, "Built provider sign-in URL");
        Ok(url)
    }

    /// Email a sign-in link. Local state is untouched.
    pub async fn sign_in_with_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&Url>,
    ) -> AuthResult<()> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner
            .call(
                "magic_link",
                inner.api.sign_in_with_magic_link(email, redirect_to),
            )
            .await?;
        info!("Magic link sent");
        Ok(())
    }

    /// Text a one-time code. Local state is untouched.
    pub async fn send_otp(&self, phone: &str) -> AuthResult<()> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner.call("send_otp", inner.api.send_otp(phone)).await?;
        info!("One-time code sent");
        Ok(())
    }

    /// Exchange a one-time code for a session.
    pub async fn verify_otp(&self, verification: &OtpVerification) -> AuthResult<Session> {
        let inner = &self.inner;
        inner.ensure_running()?;
        inner.clear_silently();

        let session = inner
            .call("verify_otp", inner.api.verify_otp(verification))
            .await?;

        info!(user_id = %session.user().id, kind = ?verification.kind(), "Verified one-time code");
        if verification.kind() == OtpType::Recovery {
            inner.adopt_and_notify(
                &session,
                &[AuthChangeEvent::SignedIn, AuthChangeEvent::PasswordRecovery],
            );
        } else {
            inner.adopt_and_notify(&session, &[AuthChangeEvent::SignedIn]);
        }
        Ok(session)
    }

    /// Adopt the session carried by a redirect URL.
    ///
    /// The URL is validated before any network traffic. The user is then
    /// fetched with the redirect's access token; on success the session is
    /// adopted and `SignedIn` is emitted, followed by `PasswordRecovery`
    /// for recovery links.
    pub async fn session_from_url(&self, url: &str) -> AuthResult<Session> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let redirect = RedirectSession::parse(url)?;
        let user = inner
            .call("get_user", inner.api.get_user(&redirect.access_token))
            .await?;

        let recovery = redirect.is_recovery();
        let session = redirect.into_session(user)?;

        info!(user_id = %session.user().id, recovery, "Adopted session from redirect");
        if recovery {
            inner.adopt_and_notify(
                &session,
                &[AuthChangeEvent::SignedIn, AuthChangeEvent::PasswordRecovery],
            );
        } else {
            inner.adopt_and_notify(&session, &[AuthChangeEvent::SignedIn]);
        }
        Ok(session)
    }

    /// Update the signed-in user.
    ///
    /// The returned user replaces the one in the current session; tokens and
    /// expiry are kept and the refresh timer is not re-armed. A refresh that
    /// lands while the update is in flight does not discard it.
    pub async fn update_user(&self, attributes: &UserAttributes) -> AuthResult<User> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let (access_token, identity) = {
            let state = inner.state.lock();
            let current = state.session.as_ref().ok_or(AuthError::NotAuthenticated)?;
            (current.session.access_token().to_string(), state.identity)
        };

        let user = inner
            .call("update_user", inner.api.update_user(&access_token, attributes))
            .await?;

        {
            let mut state = inner.state.lock();
            if state.identity != identity {
                debug!("Discarding user update, signed-in identity changed");
                return Err(AuthError::Superseded);
            }
            let current = state.session.as_mut().ok_or(AuthError::NotAuthenticated)?;
            current.session = current.session.with_user(user.clone());
            if let Err(e) = inner.store.save(current) {
                inner.persist_failed("save", e.to_string());
            }
            inner.notify_locked(AuthChangeEvent::UserUpdated, Some(&current.session));
        }
        inner.dispatcher.drain();

        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    /// Exchange the current refresh token for a new session.
    ///
    /// Joins an in-flight refresh if there is one. On failure the current
    /// session is kept and a [`Diagnostic::RefreshFailed`] is broadcast.
    pub async fn refresh_session(&self) -> AuthResult<Session> {
        self.inner.refresh(RefreshTrigger::Caller).await
    }

    /// Sign out.
    ///
    /// Local state is cleared and `SignedOut` is delivered before the
    /// provider is told; a failed revocation is returned but does not
    /// restore the session.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let previous = {
            let mut state = inner.state.lock();
            let previous = state
                .session
                .as_ref()
                .map(|current| current.session.clone())
                .ok_or(AuthError::NotAuthenticated)?;
            inner.clear_locked(&mut state);
            inner.notify_locked(AuthChangeEvent::SignedOut, None);
            previous
        };
        inner.dispatcher.drain();
        info!(user_id = %previous.user().id, "Signed out locally");

        inner
            .call("sign_out", inner.api.sign_out(previous.access_token()))
            .await
            .inspect_err(|e| warn!(error = %e, "Provider sign-out failed"))
    }

    /// Register an observer for auth state changes.
    ///
    /// Observers receive only events raised after they subscribe.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.inner.registry.lock().insert(Arc::new(callback));
        debug!(subscription = id.as_u64(), "Auth observer subscribed");
        Subscription::new(id, &self.inner.registry)
    }

    /// Receive refresh and persistence failures.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.inner.diagnostics.subscribe()
    }

    pub fn session(&self) -> Option<Session> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|current| current.session.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|current| current.session.user().clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|current| current.session.access_token().to_string())
    }

    pub fn is_signed_in(&self) -> bool {
        self.inner.state.lock().session.is_some()
    }

    pub fn status(&self) -> AuthSnapshot {
        let state = self.inner.state.lock();
        let current = state.session.as_ref();
        AuthSnapshot {
            authenticated: current.is_some(),
            user_id: current.map(|c| c.session.user().id.clone()),
            email: current.and_then(|c| c.session.user().email.clone()),
            expires_at: current.map(|c| c.expires_at),
            refreshing: state.refresh.is_some(),
        }
    }

    /// Stop the engine.
    ///
    /// Cancels the refresh timer and any in-flight remote calls and drops
    /// every observer. The session stays persisted for the next start.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        {
            let mut state = self.inner.state.lock();
            state.timer = None;
            state.refresh = None;
        }
        self.inner.registry.lock().clear();
        info!("Auth engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn armed_timer(&self) -> Option<tokio::time::Instant> {
        self.inner.state.lock().timer.as_ref().map(RefreshTimer::fires_at)
    }

    #[cfg(test)]
    pub(crate) fn armed_timer_generation(&self) -> Option<u64> {
        self.inner.state.lock().timer.as_ref().map(RefreshTimer::generation)
    }

    /// Run the timer path directly, as if timer `timer_generation` had fired.
    #[cfg(test)]
    pub(crate) async fn fire_timer(&self, timer_generation: u64) -> AuthResult<Session> {
        self.inner.refresh_on_timer(timer_generation).await
    }
}

impl std::fmt::Debug for AuthEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEngine")
            .field("status", &self.status())
            .finish()
    }
}

impl EngineInner {
    fn ensure_running(&self) -> AuthResult<()> {
        if self.shutdown.is_cancelled() {
            Err(AuthError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run a remote call under the request timeout, abandoning it on shutdown.
    async fn call<T, F>(&self, operation: &'static str, request: F) -> AuthResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                debug!(operation, "Remote call abandoned, engine shut down");
                Err(AuthError::Cancelled)
            }
            outcome = tokio::time::timeout(self.config.request_timeout, request) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    debug!(operation, error = %e, "Remote call failed");
                    Err(e.into())
                }
                Err(_) => {
                    warn!(
                        operation,
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "Remote call timed out"
                    );
                    Err(AuthError::Timeout)
                }
            }
        }
    }

    /// Load the persisted session and adopt it without a network round-trip.
    ///
    /// An expired session is adopted too; its timer fires immediately.
    fn recover(self: &Arc<Self>) {
        let persisted = match self.store.get() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                debug!("No stored session to recover");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session, starting signed out");
                return;
            }
        };

        info!(
            user_id = %persisted.session.user().id,
            expires_at = %persisted.expires_at,
            expired = persisted.is_expired(),
            "Recovered stored session"
        );
        {
            let mut state = self.state.lock();
            let session = persisted.session.clone();
            let delay = persisted.remaining();
            state.identity += 1;
            self.adopt_locked(&mut state, persisted, delay);
            self.notify_locked(AuthChangeEvent::SignedIn, Some(&session));
        }
        self.dispatcher.drain();
    }

    fn clear_silently(&self) {
        let mut state = self.state.lock();
        if let Some(previous) = self.clear_locked(&mut state) {
            debug!(user_id = %previous.session.user().id, "Cleared previous session");
        }
    }

    fn adopt_and_notify(self: &Arc<Self>, session: &Session, events: &[AuthChangeEvent]) {
        {
            let mut state = self.state.lock();
            let persisted = PersistedSession::issued_now(session.clone());
            state.identity += 1;
            self.adopt_locked(&mut state, persisted, session.expires_in());
            for event in events {
                self.notify_locked(*event, Some(session));
            }
        }
        self.dispatcher.drain();
    }

    /// Make `persisted` the current session and arm its refresh timer.
    fn adopt_locked(
        self: &Arc<Self>,
        state: &mut EngineState,
        persisted: PersistedSession,
        delay: Duration,
    ) {
        state.generation += 1;
        state.refresh = None;
        if let Err(e) = self.store.save(&persisted) {
            self.persist_failed("save", e.to_string());
        }
        self.arm_timer_locked(state, delay);
        state.session = Some(persisted);
    }

    fn clear_locked(&self, state: &mut EngineState) -> Option<PersistedSession> {
        state.generation += 1;
        state.identity += 1;
        state.timer = None;
        state.refresh = None;
        let previous = state.session.take();
        if previous.is_some() {
            if let Err(e) = self.store.remove() {
                self.persist_failed("remove", e.to_string());
            }
        }
        previous
    }

    fn arm_timer_locked(self: &Arc<Self>, state: &mut EngineState, delay: Duration) {
        state.timer = None;
        if !self.config.auto_refresh {
            return;
        }

        state.timer_generation += 1;
        let timer_generation = state.timer_generation;
        let weak = Arc::downgrade(self);
        state.timer = Some(RefreshTimer::arm(timer_generation, delay, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            debug!(timer_generation, "Refresh timer fired");
            // The refresh task reports its own failure.
            let _ = inner.refresh_on_timer(timer_generation).await;
        }));
        debug!(delay_secs = delay.as_secs(), timer_generation, "Refresh timer armed");
    }

    /// Snapshot observers and queue `event`. Call with the state lock held so
    /// queue order follows state order; drain after releasing it.
    fn notify_locked(&self, event: AuthChangeEvent, session: Option<&Session>) {
        let observers = self.registry.lock().snapshot();
        self.dispatcher.enqueue(event, session.cloned(), observers);
    }

    async fn refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> AuthResult<Session> {
        let refresh = self.refresh_future(trigger, None)?;
        refresh.await
    }

    /// Refresh on behalf of the timer armed as `timer_generation`. A timer
    /// that no longer owns the slot starts nothing.
    async fn refresh_on_timer(self: &Arc<Self>, timer_generation: u64) -> AuthResult<Session> {
        let refresh = self.refresh_future(RefreshTrigger::Timer, Some(timer_generation))?;
        refresh.await
    }

    fn refresh_future(
        self: &Arc<Self>,
        trigger: RefreshTrigger,
        timer_generation: Option<u64>,
    ) -> AuthResult<SharedRefresh> {
        self.ensure_running()?;
        let mut state = self.state.lock();

        if let Some(timer_generation) = timer_generation {
            if state.timer.as_ref().map(RefreshTimer::generation) != Some(timer_generation) {
                debug!(timer_generation, "Ignoring stale refresh timer");
                return Err(AuthError::Superseded);
            }
        }

        if let Some(in_flight) = &state.refresh {
            debug!(refresh_id = in_flight.id, ?trigger, "Joining in-flight refresh");
            return Ok(in_flight.future.clone());
        }

        let refresh_token = state
            .session
            .as_ref()
            .map(|current| current.session.refresh_token().to_string())
            .ok_or(AuthError::NotAuthenticated)?;

        state.next_refresh_id += 1;
        let id = state.next_refresh_id;
        let generation = state.generation;

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            inner
                .run_refresh(id, generation, refresh_token, trigger)
                .await
        });
        let future = async move { handle.await.unwrap_or_else(|_| Err(AuthError::Cancelled)) }
            .boxed()
            .shared();

        state.refresh = Some(InFlightRefresh {
            id,
            future: future.clone(),
        });
        Ok(future)
    }

    async fn run_refresh(
        self: Arc<Self>,
        id: u64,
        generation: u64,
        refresh_token: String,
        trigger: RefreshTrigger,
    ) -> AuthResult<Session> {
        debug!(refresh_id = id, ?trigger, "Refreshing session");
        let outcome = self.call("refresh", self.api.refresh(&refresh_token)).await;

        let result = {
            let mut state = self.state.lock();
            if state.refresh.as_ref().map(|r| r.id) == Some(id) {
                state.refresh = None;
            }
            match outcome {
                Ok(session) if state.generation == generation => {
                    let persisted = PersistedSession::issued_now(session.clone());
                    self.adopt_locked(&mut state, persisted, session.expires_in());
                    self.notify_locked(AuthChangeEvent::SignedIn, Some(&session));
                    Ok(session)
                }
                Ok(_) => Err(AuthError::Superseded),
                Err(e) => Err(e),
            }
        };
        self.dispatcher.drain();

        match &result {
            Ok(session) => {
                info!(user_id = %session.user().id, ?trigger, "Session refreshed");
            }
            Err(AuthError::Superseded) => {
                debug!(refresh_id = id, "Discarding refresh result, session changed");
            }
            Err(AuthError::Cancelled) => {}
            Err(e) => {
                warn!(error = %e, ?trigger, "Session refresh failed, keeping current session");
                let _ = self.diagnostics.send(Diagnostic::RefreshFailed {
                    error: e.clone(),
                    trigger,
                });
            }
        }
        result
    }

    fn persist_failed(&self, operation: &'static str, message: String) {
        warn!(operation, error = %message, "Session store operation failed");
        let _ = self
            .diagnostics
            .send(Diagnostic::PersistFailed { operation, message });
    }
}
