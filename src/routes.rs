//! Route table and locations for the gate.
//!
//! SYSTEM CONTEXT
//! ==============
//! Only routes under a protected prefix are gated; everything else (catalog,
//! event listings, login/register) renders regardless of session state.

use std::fmt;

use serde::Serialize;

/// A requested application location: path plus optional query string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Location {
    /// Split `raw` on the first `?`. An empty path becomes `/`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) => (p, Some(q.to_owned()).filter(|q| !q.is_empty())),
            None => (raw, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self { path: path.to_owned(), query }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(q) => write!(f, "{}?{q}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    login_path: String,
    protected_prefixes: Vec<String>,
}

impl RouteTable {
    pub fn new<I>(login_path: &str, protected_prefixes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            login_path: login_path.to_owned(),
            protected_prefixes: protected_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// `true` when `path` equals a protected prefix or sits beneath one.
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        if path == self.login_path {
            return false;
        }
        self.protected_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Where to send the user after a successful login.
///
/// Falls back to `/` when there is no remembered location or when it points
/// back at the login page itself.
#[must_use]
pub fn post_login_destination(from: Option<&Location>, routes: &RouteTable) -> String {
    match from {
        Some(loc) if loc.path != routes.login_path() => loc.to_string(),
        _ => "/".to_owned(),
    }
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
