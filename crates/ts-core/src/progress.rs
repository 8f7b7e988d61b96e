//! Progress reporting for the transform phase.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// One progress update: a status line plus a percentage in `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub status: String,
    pub percent: u8,
}

/// Sender for reporting transform progress to a caller-supplied sink.
///
/// Wraps a callback receiving a status line and a percentage. Percentages
/// are clamped to `0..=100` and never go backwards: a report lower than the
/// highest one already delivered is raised to it. A fresh sender (one per
/// job) starts over from zero.
pub struct ProgressSender {
    callback: Box<dyn Fn(&ProgressEvent) + Send + Sync>,
    high_water: Mutex<Option<u8>>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            high_water: Mutex::new(None),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Report progress.
    pub fn send(&self, status: &str, percent: u8) {
        let mut high_water = self.high_water.lock();
        let percent = percent.min(100).max(high_water.unwrap_or(0));
        *high_water = Some(percent);

        (self.callback)(&ProgressEvent {
            status: status.to_string(),
            percent,
        });
    }

    /// Highest percentage delivered so far, if any.
    pub fn last_percent(&self) -> Option<u8> {
        *self.high_water.lock()
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender")
            .field("last_percent", &self.last_percent())
            .finish_non_exhaustive()
    }
}
