//! Route gate: decides what a route renders for the current session.
//!
//! SYSTEM CONTEXT
//! ==============
//! One gate is mounted per route transition. It never mutates the session
//! directly; the only thing it can do is ask the store to re-check.
//!
//! DESIGN
//! ======
//! The render decision is a pure function of the session snapshot, the
//! gate's own `verifying` flag and the requested location. `RouteGate` adds
//! the mount-time loop: when the store says "signed out" but there is a local
//! reason to believe otherwise (cached user, marker cookie), the gate
//! re-triggers the probe a bounded number of times before letting the
//! redirect through.
//!
//! TRADE-OFFS
//! ==========
//! Manual retry from the connection-error view is a full reload: the store is
//! disposed and rebuilt, which resets `auth_initialized` as a fresh start
//! would. Gates still holding the old store see it frozen.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::RouteRetry;
use crate::routes::{Location, RouteTable};
use crate::schedule::ScheduledTask;
use crate::store::{AuthStore, Session};

/// What a gated route shows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum GateView {
    Loading,
    /// Backend unreachable; the view offers a manual retry.
    ConnectionError,
    /// Send the visitor to `to`, remembering where they were going.
    Redirect { to: String, from: Location },
    Content,
}

/// Pick the view for `location`.
///
/// Public routes always render. For protected routes the first matching rule
/// wins: still loading, connection error, signed out, content.
#[must_use]
pub fn decide_view(session: &Session, verifying: bool, location: &Location, routes: &RouteTable) -> GateView {
    if !routes.is_protected(&location.path) {
        return GateView::Content;
    }
    if (session.loading && !session.auth_initialized) || verifying {
        return GateView::Loading;
    }
    if session.connection_error {
        return GateView::ConnectionError;
    }
    if !session.auth_initialized {
        return GateView::Loading;
    }
    if !session.is_authenticated() {
        return GateView::Redirect { to: routes.login_path().to_owned(), from: location.clone() };
    }
    GateView::Content
}

// =============================================================================
// MOUNTED GATE
// =============================================================================

pub struct RouteGate {
    store: AuthStore,
    location: Location,
    routes: RouteTable,
    retry: RouteRetry,
    verifying: Arc<watch::Sender<bool>>,
    task: ScheduledTask,
}

impl RouteGate {
    /// Mount a gate for `location`. Protected routes start the verification
    /// loop in the background; public routes render immediately.
    pub fn mount(store: AuthStore, location: Location, routes: RouteTable, retry: RouteRetry) -> Self {
        let protected = routes.is_protected(&location.path);
        let (verifying, _) = watch::channel(protected);
        let verifying = Arc::new(verifying);
        let task = if protected {
            ScheduledTask::spawn(verify_on_mount(store.clone(), Arc::clone(&verifying), retry))
        } else {
            ScheduledTask::idle()
        };
        debug!(location = %location, protected, "route gate mounted");
        Self { store, location, routes, retry, verifying, task }
    }

    #[must_use]
    pub fn view(&self) -> GateView {
        decide_view(&self.store.session(), self.is_verifying(), &self.location, &self.routes)
    }

    /// `true` while the mount-time verification loop is still running.
    #[must_use]
    pub fn is_verifying(&self) -> bool {
        *self.verifying.borrow()
    }

    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    #[must_use]
    pub fn store(&self) -> &AuthStore {
        &self.store
    }

    /// Wait until the view is something other than `Loading`. Returns
    /// `Loading` only if the store is disposed first.
    pub async fn resolved(&self) -> GateView {
        let mut session = self.store.subscribe();
        let mut verifying = self.verifying.subscribe();
        loop {
            let view = self.view();
            if view != GateView::Loading || session.current().disposed {
                return view;
            }
            tokio::select! {
                changed = session.changed() => {
                    if changed.is_none() {
                        return self.view();
                    }
                }
                changed = verifying.changed() => {
                    if changed.is_err() {
                        return self.view();
                    }
                }
            }
        }
    }

    /// Manual retry from the connection-error view: reload the store and
    /// mount again on the fresh one.
    #[must_use]
    pub fn reload(self) -> Self {
        info!(location = %self.location, "manual retry; reloading session");
        let store = self.store.reload();
        store.spawn_init();
        let Self { location, routes, retry, .. } = self;
        Self::mount(store, location, routes, retry)
    }

    /// Stop the verification loop. The store keeps running.
    pub fn unmount(mut self) {
        self.task.cancel();
    }
}

async fn verify_on_mount(store: AuthStore, verifying: Arc<watch::Sender<bool>>, retry: RouteRetry) {
    let mut sub = store.subscribe();
    let start = sub.current();
    let stale_hint = start.cached_user.is_some() || store.session_marker() == Some(true);

    if sub.wait_for(|s| s.auth_initialized || s.disposed).await.is_some() {
        for attempt in 1..=retry.attempts {
            let session = sub.current();
            if session.disposed || session.is_authenticated() || session.connection_error || !stale_hint {
                break;
            }
            debug!(attempt, "signed out with a local session hint; re-checking");
            if store.check_auth_status(false).await {
                break;
            }
            if attempt < retry.attempts {
                tokio::time::sleep(retry.delay).await;
            }
        }
    }
    verifying.send_replace(false);
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
