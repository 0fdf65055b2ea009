//! Connectivity signal: re-probe when the network comes back.
//!
//! The store only reacts to an offline -> online edge; staying online or
//! going offline changes nothing. Where the signal comes from is up to the
//! host: a UI event bridge, or [`poll_reachability`] for headless runs.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::HttpTimeouts;
use crate::schedule::ScheduledTask;
use crate::store::AuthStore;
use crate::types::GateError;

impl AuthStore {
    /// Re-probe whenever `online` flips from `false` to `true`.
    ///
    /// Replaces any previous watcher. The watcher holds only a weak handle and
    /// stops when the store is disposed or the sender is dropped.
    pub fn watch_connectivity(&self, mut online: watch::Receiver<bool>) {
        let weak = self.downgrade();
        let task = ScheduledTask::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            while online.changed().await.is_ok() {
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    let Some(store) = weak.upgrade() else {
                        break;
                    };
                    store.network_online().await;
                } else if !now_online && was_online {
                    info!("network offline");
                }
                was_online = now_online;
            }
            debug!("connectivity watcher stopped");
        });
        self.set_connectivity_task(task);
    }
}

/// Poll `url` every `interval` and publish whether the backend answered.
///
/// Any HTTP response counts as reachable; only transport failures count as
/// offline. Dropping the returned task stops polling.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn poll_reachability(
    url: &str,
    interval: Duration,
    timeouts: HttpTimeouts,
) -> Result<(watch::Receiver<bool>, ScheduledTask), GateError> {
    let http = reqwest::Client::builder()
        .timeout(timeouts.request)
        .connect_timeout(timeouts.connect)
        .build()
        .map_err(|e| GateError::HttpClientBuild(e.to_string()))?;
    let url = url.to_owned();
    let (tx, rx) = watch::channel(true);

    let task = ScheduledTask::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let reachable = http.head(&url).send().await.is_ok();
            tx.send_if_modified(|online| {
                if *online == reachable {
                    return false;
                }
                *online = reachable;
                true
            });
            if tx.is_closed() {
                break;
            }
        }
    });
    Ok((rx, task))
}

#[cfg(test)]
#[path = "connectivity_test.rs"]
mod tests;
