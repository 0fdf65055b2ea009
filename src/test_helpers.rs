//! Scripted transport and fixtures shared by store and gate tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::MemoryCache;
use crate::probe::SessionTransport;
use crate::retry::RetryPolicy;
use crate::store::{AuthStore, StoreOptions};
use crate::types::{AuthFailure, Credentials, GateError, UserSummary};

pub fn alice() -> UserSummary {
    UserSummary::new(1, "a@b.com")
}

pub fn bob() -> UserSummary {
    let mut user = UserSummary::new(2, "bob@example.com");
    user.username = Some("bob".into());
    user
}

pub fn refused() -> AuthFailure {
    AuthFailure::ConnectionFailed("connection refused".into())
}

pub fn options() -> StoreOptions {
    StoreOptions {
        retry: RetryPolicy { max_retries: 3, delay: Duration::from_millis(1000) },
        request_timeout: Duration::from_secs(8),
    }
}

/// Plays back probe outcomes in order; the last one repeats forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<UserSummary, AuthFailure>>>,
    last: Mutex<Result<UserSummary, AuthFailure>>,
    probe_delay: Duration,
    marker: Option<bool>,
    login_user: Option<UserSummary>,
    logout_fails: bool,
    probe_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<UserSummary, AuthFailure>>) -> Self {
        let last = script.last().cloned().unwrap_or(Err(AuthFailure::Unauthenticated));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            probe_delay: Duration::ZERO,
            marker: None,
            login_user: None,
            logout_fails: false,
            probe_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_login_user(mut self, user: UserSummary) -> Self {
        self.login_user = Some(user);
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionTransport for ScriptedTransport {
    async fn current_user(&self) -> Result<UserSummary, AuthFailure> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => self.last.lock().unwrap().clone(),
        }
    }

    async fn login(&self, credentials: &Credentials) -> Result<UserSummary, GateError> {
        match &self.login_user {
            Some(user) if credentials.password == "correct horse" => Ok(user.clone()),
            _ => Err(GateError::LoginRejected { status: 401, body: "bad credentials".into() }),
        }
    }

    async fn logout(&self) -> Result<(), GateError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails {
            Err(GateError::Transport("connection reset".into()))
        } else {
            Ok(())
        }
    }

    fn session_marker(&self) -> Option<bool> {
        self.marker
    }
}

pub fn store_with(transport: &Arc<ScriptedTransport>, cache: &Arc<MemoryCache>) -> AuthStore {
    AuthStore::new(transport.clone(), cache.clone(), options())
}

/// Let spawned tasks that are already runnable make progress.
pub async fn settle_tasks() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
