//! Sink for failures that do not stop a loop

use parking_lot::Mutex;
use tracing::warn;

use crate::error::ClientError;

/// Receives recoverable failures (a single poll tick, a single transmit)
pub trait Reporter: Send + Sync {
    fn report(&self, context: &str, error: &ClientError);
}

/// Logs every report as a warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, context: &str, error: &ClientError) {
        warn!(context, error = %error, "Operation failed");
    }
}

/// Keeps reports in memory, in arrival order
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports seen so far, formatted as `context: error`
    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, context: &str, error: &ClientError) {
        warn!(context, error = %error, "Operation failed");
        self.reports.lock().push(format!("{}: {}", context, error));
    }
}
