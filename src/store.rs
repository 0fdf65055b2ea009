//! Auth state store: the canonical in-memory session.
//!
//! SYSTEM CONTEXT
//! ==============
//! One store is created per application run and shared (cheap `Clone`) by
//! every route gate. Consumers read snapshots with [`AuthStore::session`] or
//! subscribe to changes; only the store mutates the session.
//!
//! DESIGN
//! ======
//! The session lives in a `tokio::sync::watch` channel. Every mutation goes
//! through `send_if_modified`, so checks like "is a probe already running"
//! and the transition they guard happen under one lock.
//!
//! Probe results carry the epoch they started in. An explicit login or logout
//! bumps the epoch, and a probe that settles afterwards is dropped instead of
//! overwriting the newer answer.
//!
//! ERROR HANDLING
//! ==============
//! Probe failures never surface as `Err`: they become session state (retry,
//! connection error, signed out). Cache and backend-logout failures are
//! logged and do not block the local state change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::SessionCache;
use crate::config::GateConfig;
use crate::probe::SessionTransport;
use crate::retry::{AuthPhase, RetryDecision, RetryPolicy};
use crate::schedule::ScheduledTask;
use crate::types::{AuthFailure, Credentials, GateError, UserSummary};

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of the authentication state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Identity from the last successful probe or login.
    pub user: Option<UserSummary>,
    /// Set once the first probe cycle settles; never cleared afterwards.
    pub auth_initialized: bool,
    pub loading: bool,
    /// Last transient failure was a transport failure.
    pub connection_error: bool,
    pub retry_count: u32,
    pub phase: AuthPhase,
    /// Last-known user read from the local cache at start-up. A hint only.
    pub cached_user: Option<UserSummary>,
    /// The store was disposed; no further updates will arrive.
    pub disposed: bool,
}

impl Session {
    fn initial(cached_user: Option<UserSummary>) -> Self {
        Self {
            user: None,
            auth_initialized: false,
            loading: true,
            connection_error: false,
            retry_count: 0,
            phase: AuthPhase::Init,
            cached_user,
            disposed: false,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

fn enter(session: &mut Session, next: AuthPhase) {
    if !session.phase.can_transition_to(next) {
        warn!(from = ?session.phase, to = ?next, "unexpected auth phase transition");
    }
    session.phase = next;
}

// =============================================================================
// SUBSCRIPTION
// =============================================================================

/// Change feed for one consumer. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops delivery.
pub struct Subscription {
    rx: watch::Receiver<Session>,
}

impl Subscription {
    /// Latest snapshot, without marking it seen.
    #[must_use]
    pub fn current(&self) -> Session {
        Session::clone(&self.rx.borrow())
    }

    /// Wait for the next change. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.rx.changed().await.ok()?;
        Some(Session::clone(&self.rx.borrow_and_update()))
    }

    /// Wait until `predicate` holds (checked against the current value first).
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<Session>
    where
        F: FnMut(&Session) -> bool,
    {
        self.rx.wait_for(predicate).await.ok().map(|s| Session::clone(&s))
    }

    /// `true` if an update arrived that has not been observed yet.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    pub fn unsubscribe(self) {}
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    pub retry: RetryPolicy,
    /// Upper bound on a single probe, login or logout call.
    pub request_timeout: Duration,
}

impl From<&GateConfig> for StoreOptions {
    fn from(config: &GateConfig) -> Self {
        Self { retry: config.retry, request_timeout: config.timeouts.request }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CheckMode {
    /// Caller-initiated; coalesces with a running cycle.
    Fresh,
    /// Fired by the retry timer; only valid while awaiting that retry.
    Retry,
    /// Network came back; pre-empts a pending retry with a clean budget.
    Reconnect,
}

struct StoreInner {
    transport: Arc<dyn SessionTransport>,
    cache: Arc<dyn SessionCache>,
    options: StoreOptions,
    state: watch::Sender<Session>,
    epoch: AtomicU64,
    retry_timer: Mutex<ScheduledTask>,
    init_task: Mutex<ScheduledTask>,
    connectivity: Mutex<ScheduledTask>,
}

#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<StoreInner>,
}

/// Non-owning handle used by background tasks so they never keep a disposed
/// store alive.
#[derive(Clone)]
pub(crate) struct WeakStore(Weak<StoreInner>);

impl WeakStore {
    pub(crate) fn upgrade(&self) -> Option<AuthStore> {
        self.0.upgrade().map(|inner| AuthStore { inner })
    }
}

impl AuthStore {
    /// Build a store in the `Init` phase. The cache is read once, here.
    pub fn new(transport: Arc<dyn SessionTransport>, cache: Arc<dyn SessionCache>, options: StoreOptions) -> Self {
        let cached_user = match cache.load() {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session cache");
                None
            }
        };
        let (state, _) = watch::channel(Session::initial(cached_user));
        Self {
            inner: Arc::new(StoreInner {
                transport,
                cache,
                options,
                state,
                epoch: AtomicU64::new(0),
                retry_timer: Mutex::new(ScheduledTask::idle()),
                init_task: Mutex::new(ScheduledTask::idle()),
                connectivity: Mutex::new(ScheduledTask::idle()),
            }),
        }
    }

    /// Run the initial probe. Same as `check_auth_status(false)`.
    pub async fn init(&self) -> bool {
        self.check_auth_status(false).await
    }

    /// Run the initial probe in the background.
    pub fn spawn_init(&self) {
        let weak = self.downgrade();
        let task = ScheduledTask::spawn(async move {
            if let Some(store) = weak.upgrade() {
                store.init().await;
            }
        });
        lock(&self.inner.init_task).replace(task);
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn session(&self) -> Session {
        Session::clone(&self.inner.state.borrow())
    }

    #[must_use]
    pub fn user(&self) -> Option<UserSummary> {
        self.inner.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    #[must_use]
    pub fn auth_initialized(&self) -> bool {
        self.inner.state.borrow().auth_initialized
    }

    #[must_use]
    pub fn connection_error(&self) -> bool {
        self.inner.state.borrow().connection_error
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.borrow().disposed
    }

    /// Marker-cookie hint from the transport.
    #[must_use]
    pub fn session_marker(&self) -> Option<bool> {
        self.inner.transport.session_marker()
    }

    /// `true` while a retry timer is scheduled.
    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        lock(&self.inner.retry_timer).is_pending()
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.inner.state.subscribe() }
    }

    /// Wait until the first probe cycle has settled.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Disposed`] if the store is disposed first.
    pub async fn settled(&self) -> Result<Session, GateError> {
        let mut sub = self.subscribe();
        let session = sub
            .wait_for(|s| s.auth_initialized || s.disposed)
            .await
            .ok_or(GateError::Disposed)?;
        if session.auth_initialized {
            Ok(session)
        } else {
            Err(GateError::Disposed)
        }
    }

    // -------------------------------------------------------------------------
    // Login / logout
    // -------------------------------------------------------------------------

    /// Record `user` as the authenticated identity and persist it.
    pub fn login(&self, user: UserSummary) {
        lock(&self.inner.retry_timer).cancel();
        let applied = self.apply(|s| {
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            s.user = Some(user.clone());
            s.connection_error = false;
            s.retry_count = 0;
            s.auth_initialized = true;
            s.loading = false;
            enter(s, AuthPhase::Authenticated);
        });
        if applied {
            self.persist(&user);
            info!(user_id = %user.id, "session authenticated");
        }
    }

    /// Post credentials to the backend and log in with the returned user.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the backend rejects the credentials or
    /// cannot be reached; the session is left unchanged.
    pub async fn login_with_credentials(&self, email: &str, password: &str) -> Result<UserSummary, GateError> {
        let credentials = Credentials { email: email.to_owned(), password: password.to_owned() };
        let timeout = self.inner.options.request_timeout;
        let user = match tokio::time::timeout(timeout, self.inner.transport.login(&credentials)).await {
            Ok(result) => result?,
            Err(_) => return Err(GateError::Transport(format!("login timed out after {}ms", timeout.as_millis()))),
        };
        if self.is_disposed() {
            return Err(GateError::Disposed);
        }
        self.login(user.clone());
        Ok(user)
    }

    /// Sign out. The backend call is best-effort; local state and the cache
    /// are cleared whatever it returns.
    pub async fn logout(&self) {
        lock(&self.inner.retry_timer).cancel();
        let timeout = self.inner.options.request_timeout;
        match tokio::time::timeout(timeout, self.inner.transport.logout()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "backend logout failed; clearing local session anyway"),
            Err(_) => warn!("backend logout timed out; clearing local session anyway"),
        }
        self.apply(|s| {
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            s.user = None;
            s.cached_user = None;
            s.connection_error = false;
            s.retry_count = 0;
            s.auth_initialized = true;
            s.loading = false;
            enter(s, AuthPhase::Unauthenticated);
        });
        if let Err(e) = self.inner.cache.clear() {
            warn!(error = %e, "failed to clear session cache");
        }
        info!("session logged out");
    }

    // -------------------------------------------------------------------------
    // Probing
    // -------------------------------------------------------------------------

    /// Probe the backend and fold the answer into the session.
    ///
    /// Returns `true` only when the probe authenticated the session. A call
    /// made while another cycle is running (and `is_retry` is false) is a
    /// no-op that reports the current state.
    pub async fn check_auth_status(&self, is_retry: bool) -> bool {
        let mode = if is_retry { CheckMode::Retry } else { CheckMode::Fresh };
        self.run_check(mode).await
    }

    /// The network came back: re-probe now with a fresh retry budget.
    pub async fn network_online(&self) -> bool {
        info!("network online; re-checking session");
        self.run_check(CheckMode::Reconnect).await
    }

    async fn run_check(&self, mode: CheckMode) -> bool {
        let mut started = false;
        let mut current = false;
        let mut preempted_retry = false;
        let mut epoch = 0;
        self.inner.state.send_if_modified(|s| {
            current = s.is_authenticated();
            if s.disposed {
                return false;
            }
            let busy = match mode {
                CheckMode::Fresh => s.phase.is_cycle_active(),
                CheckMode::Retry => s.phase != AuthPhase::AwaitingRetry,
                CheckMode::Reconnect => s.phase == AuthPhase::Checking,
            };
            if busy {
                return false;
            }
            // A retry keeps the count it was scheduled with.
            if mode != CheckMode::Retry {
                preempted_retry = s.phase == AuthPhase::AwaitingRetry;
                s.retry_count = 0;
                s.loading = true;
            }
            enter(s, AuthPhase::Checking);
            epoch = self.inner.epoch.load(Ordering::SeqCst);
            started = true;
            true
        });
        if !started {
            debug!(?mode, "auth check coalesced with running cycle");
            return current;
        }
        if preempted_retry {
            lock(&self.inner.retry_timer).cancel();
        }

        debug!(?mode, marker = ?self.session_marker(), "checking auth status");
        let outcome = self.probe().await;
        self.settle(epoch, outcome)
    }

    async fn probe(&self) -> Result<UserSummary, AuthFailure> {
        let timeout = self.inner.options.request_timeout;
        match tokio::time::timeout(timeout, self.inner.transport.current_user()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AuthFailure::ConnectionFailed(format!(
                "probe timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn settle(&self, epoch: u64, outcome: Result<UserSummary, AuthFailure>) -> bool {
        match outcome {
            Ok(user) => {
                let applied = self.apply_for_epoch(epoch, |s| {
                    s.user = Some(user.clone());
                    s.connection_error = false;
                    s.retry_count = 0;
                    s.auth_initialized = true;
                    s.loading = false;
                    enter(s, AuthPhase::Authenticated);
                });
                if applied {
                    self.persist(&user);
                    info!(user_id = %user.id, "session verified");
                }
                applied
            }
            Err(failure) => {
                let policy = self.inner.options.retry;
                let mut decision = None;
                self.apply_for_epoch(epoch, |s| {
                    let next = policy.decide(s.retry_count, &failure);
                    if matches!(failure, AuthFailure::ConnectionFailed(_)) {
                        s.connection_error = true;
                    }
                    match next {
                        RetryDecision::Retry { attempt, .. } => {
                            s.retry_count = attempt;
                            enter(s, AuthPhase::AwaitingRetry);
                        }
                        RetryDecision::GiveUp { clear_user } => {
                            if clear_user {
                                s.user = None;
                            }
                            s.auth_initialized = true;
                            s.loading = false;
                            if failure == AuthFailure::Unauthenticated {
                                s.connection_error = false;
                                s.retry_count = 0;
                                enter(s, AuthPhase::Unauthenticated);
                            } else {
                                enter(s, AuthPhase::GivenUp);
                            }
                        }
                    }
                    decision = Some(next);
                });
                match decision {
                    Some(RetryDecision::Retry { attempt, delay }) => {
                        warn!(error = %failure, attempt, ?delay, "auth check failed; retrying");
                        self.schedule_retry(delay);
                    }
                    Some(RetryDecision::GiveUp { clear_user }) => {
                        if failure == AuthFailure::Unauthenticated {
                            info!("no authenticated session");
                        } else {
                            warn!(error = %failure, clear_user, "auth check gave up after retries");
                        }
                    }
                    None => debug!("stale auth check result dropped"),
                }
                false
            }
        }
    }

    fn schedule_retry(&self, delay: Duration) {
        let weak = self.downgrade();
        let task = ScheduledTask::after(delay, async move {
            let Some(store) = weak.upgrade() else {
                return;
            };
            lock(&store.inner.retry_timer).detach();
            store.run_check(CheckMode::Retry).await;
        });
        lock(&self.inner.retry_timer).replace(task);
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Cancel pending work and freeze the session. Later probe results,
    /// retries and connectivity signals are ignored.
    pub fn dispose(&self) {
        lock(&self.inner.retry_timer).cancel();
        lock(&self.inner.init_task).cancel();
        lock(&self.inner.connectivity).cancel();
        let first = self.inner.state.send_if_modified(|s| {
            if s.disposed {
                return false;
            }
            s.disposed = true;
            true
        });
        if first {
            info!("auth store disposed");
        }
    }

    /// Full reload: dispose this store and return a fresh one over the same
    /// transport and cache. The new store starts in `Init`; call
    /// [`AuthStore::init`] or [`AuthStore::spawn_init`] on it.
    #[must_use]
    pub fn reload(&self) -> Self {
        self.dispose();
        Self::new(Arc::clone(&self.inner.transport), Arc::clone(&self.inner.cache), self.inner.options)
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Arc::downgrade(&self.inner))
    }

    pub(crate) fn set_connectivity_task(&self, task: ScheduledTask) {
        lock(&self.inner.connectivity).replace(task);
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn apply<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        self.inner.state.send_if_modified(|s| {
            if s.disposed {
                return false;
            }
            f(s);
            true
        })
    }

    fn apply_for_epoch<F>(&self, epoch: u64, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        self.inner.state.send_if_modified(|s| {
            if s.disposed || self.inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            f(s);
            true
        })
    }

    fn persist(&self, user: &UserSummary) {
        if let Err(e) = self.inner.cache.store(user) {
            warn!(error = %e, "failed to persist session cache");
        }
    }
}

fn lock(slot: &Mutex<ScheduledTask>) -> MutexGuard<'_, ScheduledTask> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
