//! Progress reporting shared by engines, the router and the orchestrator.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// A single progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Percentage complete (0-100).
    pub percent: u8,
    /// Human readable description of the current step.
    pub message: String,
}

/// Sends progress updates to an optional listener.
///
/// Reported percentages never go backwards: a value lower than one already
/// reported is raised to the previous maximum. Clones share that maximum and
/// send while holding it, so updates from several threads still arrive in
/// non-decreasing order.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressUpdate>>,
    last: Arc<Mutex<u8>>,
}

impl ProgressReporter {
    /// Creates a reporter that forwards to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self {
            tx: Some(tx),
            last: Arc::new(Mutex::new(0)),
        }
    }

    /// Creates a reporter together with the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// A reporter that drops every update.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Reports progress. Values above 100 are clamped.
    pub fn report(&self, percent: u8, message: impl Into<String>) {
        let mut last = self.lock_last();
        *last = (*last).max(percent.min(100));
        let effective = *last;

        if let Some(ref tx) = self.tx {
            // A dropped receiver only means nobody is listening anymore.
            let _ = tx.send(ProgressUpdate {
                percent: effective,
                message: message.into(),
            });
        }
    }

    /// Highest percentage reported so far.
    pub fn last_percent(&self) -> u8 {
        *self.lock_last()
    }

    fn lock_last(&self) -> MutexGuard<'_, u8> {
        // The guarded value is a plain number, so a poisoned lock is still usable
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
