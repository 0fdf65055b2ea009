//! Cancellable delayed tasks.
//!
//! DESIGN
//! ======
//! A `ScheduledTask` owns the `JoinHandle` of a spawned tokio task. Cancel
//! aborts it; dropping the slot aborts it too, so a timer can never outlive
//! the component that scheduled it. A task that is about to run its own
//! follow-up calls [`ScheduledTask::detach`] first so replacing the slot does
//! not abort the running task.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// An empty slot with nothing scheduled.
    #[must_use]
    pub fn idle() -> Self {
        Self { handle: None }
    }

    /// Spawn `work` to run after `delay`. Must be called inside a tokio runtime.
    pub fn after<F>(delay: Duration, work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        Self { handle: Some(handle) }
    }

    /// Spawn `work` immediately.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self { handle: Some(tokio::spawn(work)) }
    }

    /// `true` while the task has been scheduled and has not finished.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Abort the task if it is still pending. Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Forget the task without aborting it.
    pub fn detach(&mut self) {
        self.handle.take();
    }

    /// Cancel whatever is pending and put `next` in its place.
    pub fn replace(&mut self, next: Self) {
        self.cancel();
        *self = next;
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "schedule_test.rs"]
mod tests;
