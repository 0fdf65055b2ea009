//! Retry controller: session verification phases and the retry decision.
//!
//! DESIGN
//! ======
//! A probe cycle moves `Init -> Checking` and settles in one of
//! `Authenticated`, `Unauthenticated` or `GivenUp`. Transient failures park
//! the cycle in `AwaitingRetry` until the scheduled retry fires and the cycle
//! re-enters `Checking`.
//!
//! The decision itself is pure so the store only has to apply it.

use std::time::Duration;

use serde::Serialize;

use crate::types::AuthFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Init,
    Checking,
    AwaitingRetry,
    Authenticated,
    Unauthenticated,
    GivenUp,
}

impl AuthPhase {
    /// Phases in which a probe cycle has settled.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Authenticated | Self::Unauthenticated | Self::GivenUp)
    }

    /// `true` while a cycle owns the probe (in flight or waiting on a retry).
    #[must_use]
    pub fn is_cycle_active(self) -> bool {
        matches!(self, Self::Checking | Self::AwaitingRetry)
    }

    /// Whether `self -> next` is a legal move.
    ///
    /// Explicit login/logout may settle the session from any phase, which is
    /// why `Authenticated`/`Unauthenticated` are always reachable.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::Init) | (Self::Checking, Self::Checking) => false,
            (_, Self::Checking | Self::Authenticated | Self::Unauthenticated) => true,
            (Self::Checking, Self::AwaitingRetry | Self::GivenUp) => true,
            _ => false,
        }
    }
}

/// What the store should do after a failed probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule attempt number `attempt` after `delay`; leave the user alone.
    Retry { attempt: u32, delay: Duration },
    /// Settle the cycle. `clear_user` says whether the held identity is dropped.
    GiveUp { clear_user: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Decide the next step after `failure`, given retries already spent.
    ///
    /// `Unauthenticated` is authoritative and never retried. Transient
    /// failures are retried until `max_retries`; after that a connection
    /// failure keeps the user while an unexpected error drops it.
    #[must_use]
    pub fn decide(&self, retry_count: u32, failure: &AuthFailure) -> RetryDecision {
        match failure {
            f if f.is_transient() && retry_count < self.max_retries => {
                RetryDecision::Retry { attempt: retry_count + 1, delay: self.delay }
            }
            AuthFailure::ConnectionFailed(_) => RetryDecision::GiveUp { clear_user: false },
            AuthFailure::Unauthenticated | AuthFailure::UnexpectedError(_) => RetryDecision::GiveUp { clear_user: true },
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
