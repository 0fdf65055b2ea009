//! Session authentication gate for the BoardGameConnect client.
//!
//! Verifies the cookie-backed backend session on start-up and on every
//! protected route transition, retrying transient backend or network
//! failures before deciding whether a route renders, waits, reports a
//! connection error, or redirects to the login page.
//!
//! The pieces, leaves first: [`probe`] asks the backend who the session
//! belongs to, [`retry`] decides what a failed probe means, [`store`] owns the
//! session state, and [`gate`] turns that state into a view.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod gate;
pub mod probe;
pub mod retry;
pub mod routes;
pub mod schedule;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cache::{CacheError, FileCache, MemoryCache, SessionCache};
pub use config::{ConfigError, GateConfig, HttpTimeouts, RouteRetry};
pub use gate::{GateView, RouteGate, decide_view};
pub use probe::{HttpTransport, SessionTransport};
pub use retry::{AuthPhase, RetryDecision, RetryPolicy};
pub use routes::{Location, RouteTable, post_login_destination};
pub use store::{AuthStore, Session, StoreOptions, Subscription};
pub use types::{AuthFailure, Credentials, GateError, UserSummary};
