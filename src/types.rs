//! Shared session types and errors.
//!
//! DESIGN
//! ======
//! `UserSummary` is passed through from the backend untouched: the gate only
//! cares whether one exists, so unknown fields are kept in `extra` and
//! re-serialized as-is when the summary is cached.

use serde::{Deserialize, Serialize};

// =============================================================================
// USER SUMMARY
// =============================================================================

/// Identity returned by the backend's "current user" and login endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Backend user identifier (numeric or string, kept as received).
    pub id: serde_json::Value,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Whether the user has listed at least one game copy.
    #[serde(default)]
    pub is_game_owner: bool,
    /// Any other fields the backend sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserSummary {
    /// Build a summary with only an id and email set.
    #[must_use]
    pub fn new(id: impl Into<serde_json::Value>, email: &str) -> Self {
        Self {
            id: id.into(),
            email: Some(email.to_owned()),
            username: None,
            is_game_owner: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// Email/password pair posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// PROBE FAILURES
// =============================================================================

/// Why a session probe did not produce a user.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// The backend answered and said there is no valid session.
    #[error("not authenticated")]
    Unauthenticated,

    /// The backend could not be reached, or did not answer in time.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Any other non-success status or an unreadable payload.
    #[error("unexpected probe error: {0}")]
    UnexpectedError(String),
}

impl AuthFailure {
    /// `true` for failures that say nothing about the session and may be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::UnexpectedError(_))
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by store and transport operations other than probing.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The backend refused the credentials or the request.
    #[error("login rejected: status {status}")]
    LoginRejected { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(String),

    /// The response body was not a user summary.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The store was disposed before the operation could apply its result.
    #[error("auth store disposed")]
    Disposed,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
