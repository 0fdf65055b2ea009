//! Gate configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::routes::RouteTable;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 8000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_ROUTE_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_ROUTE_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/profile", "/my-games", "/borrow-requests", "/lending", "/events/new"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid GATE_API_BASE_URL '{value}': {reason}")]
    InvalidBaseUrl { value: String, reason: String },
    #[error("invalid GATE_LOGIN_PATH '{0}': must start with '/'")]
    InvalidLoginPath(String),
}

/// Timeouts applied to every backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

/// Bounded retry loop run by each mounted route gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRetry {
    pub attempts: u32,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub api_base_url: String,
    pub retry: RetryPolicy,
    pub timeouts: HttpTimeouts,
    pub route_retry: RouteRetry,
    pub routes: RouteTable,
    /// Where the last-known user is persisted. In-memory when `None`.
    pub cache_path: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            retry: RetryPolicy {
                max_retries: DEFAULT_MAX_RETRIES,
                delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            },
            timeouts: HttpTimeouts {
                request: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
                connect: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            },
            route_retry: RouteRetry {
                attempts: DEFAULT_ROUTE_RETRY_ATTEMPTS,
                delay: Duration::from_millis(DEFAULT_ROUTE_RETRY_DELAY_MS),
            },
            routes: RouteTable::new(DEFAULT_LOGIN_PATH, DEFAULT_PROTECTED_PREFIXES.iter().copied()),
            cache_path: None,
        }
    }
}

impl GateConfig {
    /// Build typed gate config from environment variables.
    ///
    /// Optional (defaults in parentheses):
    /// - `GATE_API_BASE_URL` (`http://127.0.0.1:8080/api`)
    /// - `GATE_MAX_RETRIES` (3), `GATE_RETRY_DELAY_MS` (1000)
    /// - `GATE_PROBE_TIMEOUT_MS` (8000), `GATE_CONNECT_TIMEOUT_MS` (3000)
    /// - `GATE_ROUTE_RETRY_ATTEMPTS` (3), `GATE_ROUTE_RETRY_DELAY_MS` (1000)
    /// - `GATE_LOGIN_PATH` (`/login`)
    /// - `GATE_PROTECTED_PREFIXES`: comma-separated path prefixes
    /// - `GATE_CACHE_PATH`: JSON file for the last-known user
    ///
    /// Unparseable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or login path is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GateConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or login path is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse_u64 = |key: &str, default: u64| lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default);
        let parse_u32 = |key: &str, default: u32| lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default);

        let api_base_url = lookup("GATE_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_owned())
            .trim()
            .trim_end_matches('/')
            .to_owned();
        validate_base_url(&api_base_url)?;

        let login_path = lookup("GATE_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_owned());
        if !login_path.starts_with('/') {
            return Err(ConfigError::InvalidLoginPath(login_path));
        }
        let routes = match lookup("GATE_PROTECTED_PREFIXES") {
            Some(raw) => RouteTable::new(&login_path, parse_prefixes(&raw)),
            None => RouteTable::new(&login_path, DEFAULT_PROTECTED_PREFIXES.iter().copied()),
        };

        Ok(Self {
            api_base_url,
            retry: RetryPolicy {
                max_retries: parse_u32("GATE_MAX_RETRIES", DEFAULT_MAX_RETRIES),
                delay: Duration::from_millis(parse_u64("GATE_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)),
            },
            timeouts: HttpTimeouts {
                request: Duration::from_millis(parse_u64("GATE_PROBE_TIMEOUT_MS", DEFAULT_PROBE_TIMEOUT_MS)),
                connect: Duration::from_millis(parse_u64("GATE_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)),
            },
            route_retry: RouteRetry {
                attempts: parse_u32("GATE_ROUTE_RETRY_ATTEMPTS", DEFAULT_ROUTE_RETRY_ATTEMPTS),
                delay: Duration::from_millis(parse_u64("GATE_ROUTE_RETRY_DELAY_MS", DEFAULT_ROUTE_RETRY_DELAY_MS)),
            },
            routes,
            cache_path: lookup("GATE_CACHE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}

fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl {
        value: raw.to_owned(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidBaseUrl {
            value: raw.to_owned(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn parse_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| p.starts_with('/'))
        .map(|p| p.trim_end_matches('/').to_owned())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
