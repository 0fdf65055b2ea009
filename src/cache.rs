//! Local cache for the last-known user.
//!
//! SYSTEM CONTEXT
//! ==============
//! The cached summary is a rendering hint read once when the store is built.
//! It is never treated as proof of a session; only a probe or login can set
//! the store's user.
//!
//! ERROR HANDLING
//! ==============
//! Callers treat cache failures as non-fatal. A corrupt slot reads back as
//! an error so the store can log it and start empty.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::UserSummary;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache io failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache entry is not a user summary: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A single persisted key-value slot holding the serialized user.
pub trait SessionCache: Send + Sync {
    /// Read the slot. `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or does not decode.
    fn load(&self) -> Result<Option<UserSummary>, CacheError>;

    /// Overwrite the slot with `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    fn store(&self, user: &UserSummary) -> Result<(), CacheError>;

    /// Empty the slot. Clearing an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be removed.
    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    user: UserSummary,
}

// =============================================================================
// FILE CACHE
// =============================================================================

/// JSON file holding `{"user": {...}}`.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io { path: self.path.clone(), source }
    }
}

impl SessionCache for FileCache {
    fn load(&self) -> Result<Option<UserSummary>, CacheError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let entry: CacheEntry = serde_json::from_str(&raw)?;
        Ok(Some(entry.user))
    }

    fn store(&self, user: &UserSummary) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_string(&CacheEntry { user: user.clone() })?;
        std::fs::write(&self.path, raw).map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// =============================================================================
// MEMORY CACHE
// =============================================================================

/// In-process slot. Holds the serialized form so decode behavior matches
/// [`FileCache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    slot: Mutex<Option<String>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that already holds `user`.
    #[must_use]
    pub fn with_user(user: &UserSummary) -> Self {
        let raw = serde_json::to_string(&CacheEntry { user: user.clone() }).ok();
        Self { slot: Mutex::new(raw) }
    }

    /// A cache whose slot holds `raw` verbatim.
    #[must_use]
    pub fn with_raw(raw: &str) -> Self {
        Self { slot: Mutex::new(Some(raw.to_owned())) }
    }

    /// `true` when something is stored.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }
}

impl SessionCache for MemoryCache {
    fn load(&self) -> Result<Option<UserSummary>, CacheError> {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str::<CacheEntry>(raw)?.user)),
            None => Ok(None),
        }
    }

    fn store(&self, user: &UserSummary) -> Result<(), CacheError> {
        let raw = serde_json::to_string(&CacheEntry { user: user.clone() })?;
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
