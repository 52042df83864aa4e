//! Cancellable periodic tasks

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A background task running a closure on a fixed interval
///
/// The task stops when the closure returns `false` and is aborted when the
/// `PollTask` is dropped, so a poller never outlives the view that owns it.
pub struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Run `tick` now and then every `interval`
    pub fn spawn<F, Fut>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !tick().await {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task now
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
