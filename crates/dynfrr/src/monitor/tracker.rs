//! Consecutive-failure debouncing for the bootstrap monitor.

use runtimecfg_common::APIState;

/// Turns a stream of health-check outcomes into `APIState` transitions.
///
/// `Stopped` is produced on every failure once the run of failures strictly
/// exceeds the threshold. `Started` is produced once, on the first success
/// after such a breach.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    /// Length of the current run of failures
    consecutive_failures: u32,
    /// Failures tolerated before stopping
    threshold: u32,
}

impl FailureTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    /// Record a failed health check
    pub fn record_failure(&mut self) -> Option<APIState> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.breached().then_some(APIState::Stopped)
    }

    /// Record a successful health check
    pub fn record_success(&mut self) -> Option<APIState> {
        let recovered = self.breached();
        self.consecutive_failures = 0;
        recovered.then_some(APIState::Started)
    }

    /// Record an outcome, dispatching on success
    pub fn record(&mut self, healthy: bool) -> Option<APIState> {
        if healthy {
            self.record_success()
        } else {
            self.record_failure()
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether the failure run exceeds the threshold
    pub fn breached(&self) -> bool {
        self.consecutive_failures > self.threshold
    }
}
