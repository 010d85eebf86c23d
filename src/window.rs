//! Sliding time window of failure instants.

use smallvec::SmallVec;
use std::time::{Duration, Instant};

/// Failure instants recorded within the last `window` of time.
///
/// Not synchronized on its own; the circuit breaker keeps it under the same
/// lock as the rest of its state. Instants must be recorded in
/// non-decreasing order.
#[derive(Debug, Clone)]
pub(crate) struct FailureWindow {
    failures: SmallVec<[Instant; 16]>,
    window: Duration,
}

impl FailureWindow {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            failures: SmallVec::new(),
            window,
        }
    }

    /// Records a failure at `now`, dropping failures that have left the window.
    pub(crate) fn record(&mut self, now: Instant) {
        self.purge(now);
        self.failures.push(now);
    }

    /// Number of failures still inside the window at `now`.
    pub(crate) fn count(&self, now: Instant) -> usize {
        match now.checked_sub(self.window) {
            Some(cutoff) => self.failures.iter().filter(|t| **t >= cutoff).count(),
            None => self.failures.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn clear(&mut self) {
        self.failures.clear();
    }

    fn purge(&mut self, now: Instant) {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        let expired = self.failures.iter().take_while(|t| **t < cutoff).count();
        if expired > 0 {
            self.failures.drain(..expired);
        }
    }
}
