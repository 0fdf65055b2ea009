//! Session probe: "who am I" against the backend.
//!
//! ARCHITECTURE
//! ============
//! `SessionTransport` is the seam between the store and the network. The
//! production `HttpTransport` keeps a cookie jar (the backend session is
//! cookie-based, never a bearer token); tests script their own transports.
//!
//! Response classification lives in pure functions so status/payload
//! handling is testable without a server.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use tracing::debug;

use crate::config::HttpTimeouts;
use crate::types::{AuthFailure, Credentials, GateError, UserSummary};

/// Non-HttpOnly cookie the backend sets alongside the real session cookie.
pub const SESSION_MARKER_COOKIE: &str = "isAuthenticated";

const CURRENT_USER_PATH: &str = "/users/me";
const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";

#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Ask the backend who the current session belongs to.
    async fn current_user(&self) -> Result<UserSummary, AuthFailure>;

    /// Exchange credentials for a session.
    async fn login(&self, credentials: &Credentials) -> Result<UserSummary, GateError>;

    /// Invalidate the server-side session.
    async fn logout(&self) -> Result<(), GateError>;

    /// Fast local hint from the marker cookie. `None` when unknown.
    fn session_marker(&self) -> Option<bool> {
        None
    }
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

pub struct HttpTransport {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    base: reqwest::Url,
}

impl HttpTransport {
    /// Build a cookie-carrying client for `base_url` (e.g. `http://host/api`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the client fails to build.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, GateError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let base = reqwest::Url::parse(&base_url).map_err(|e| GateError::HttpClientBuild(e.to_string()))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| GateError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, jar, base_url, base })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait::async_trait]
impl SessionTransport for HttpTransport {
    async fn current_user(&self) -> Result<UserSummary, AuthFailure> {
        let url = self.endpoint(CURRENT_USER_PATH);
        debug!(%url, "probing session");
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthFailure::ConnectionFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AuthFailure::ConnectionFailed(e.to_string()))?;
        classify_probe_response(status, &body)
    }

    async fn login(&self, credentials: &Credentials) -> Result<UserSummary, GateError> {
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .json(credentials)
            .send()
            .await
            .map_err(|e| GateError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GateError::Transport(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(GateError::LoginRejected { status, body });
        }
        parse_user_payload(&body).map_err(GateError::Parse)
    }

    async fn logout(&self) -> Result<(), GateError> {
        let response = self
            .http
            .post(self.endpoint(LOGOUT_PATH))
            .send()
            .await
            .map_err(|e| GateError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(GateError::Transport(format!("logout returned status {status}")))
        }
    }

    fn session_marker(&self) -> Option<bool> {
        let header = self.jar.cookies(&self.base)?;
        parse_marker_cookie(header.to_str().ok()?)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Map a "current user" response onto the probe outcome.
///
/// 2xx with a user summary is authenticated, 401 is authoritative
/// unauthenticated, anything else is unexpected.
pub fn classify_probe_response(status: u16, body: &str) -> Result<UserSummary, AuthFailure> {
    match status {
        200..=299 => parse_user_payload(body).map_err(AuthFailure::UnexpectedError),
        401 => Err(AuthFailure::Unauthenticated),
        other => Err(AuthFailure::UnexpectedError(format!("unexpected status {other}"))),
    }
}

/// Decode a user summary, accepting both a bare object and `{"user": {...}}`.
pub fn parse_user_payload(body: &str) -> Result<UserSummary, String> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let user = match value {
        serde_json::Value::Object(mut map) if map.contains_key("user") && !map.contains_key("id") => {
            map.remove("user").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(user).map_err(|e| e.to_string())
}

/// Read the marker cookie out of a `Cookie` header value.
///
/// `None` when the cookie is absent; otherwise whether its value is `true`.
#[must_use]
pub fn parse_marker_cookie(header: &str) -> Option<bool> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_MARKER_COOKIE)
        .map(|(_, value)| value.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
#[path = "probe_test.rs"]
mod tests;
