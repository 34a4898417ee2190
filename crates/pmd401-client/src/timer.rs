//! Self-rescheduling delayed callback.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs a callback on a spawned task after a delay.
///
/// The callback decides whether it runs again: `Some(delay)` re-arms it for
/// that long, `None` finishes the task.
#[derive(Debug)]
pub struct DelayedCallback {
    task: JoinHandle<()>,
}

impl DelayedCallback {
    pub fn spawn<F, Fut>(initial_delay: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Option<Duration>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut delay = initial_delay;
            loop {
                tokio::time::sleep(delay).await;
                match callback().await {
                    Some(next) => delay = next,
                    None => return,
                }
            }
        });
        Self { task }
    }

    /// Stop the pending callback. It will not run again.
    pub fn cancel(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
