//! Bootstrap API monitor.
//!
//! When the installer preserves the bootstrap node, FRR on the bootstrap
//! would keep advertising the API VIP after the control plane has moved to
//! the masters. This monitor watches the local kube-apiserver and publishes
//! `Stopped` once it has been failing for longer than the threshold, and
//! `Started` if it comes back afterwards.

use std::sync::Arc;
use std::time::Duration;

use runtimecfg_common::APIState;
use runtimecfg_common::constants::{
    BOOTSTRAP_API_FAILURES_THRESHOLD, BOOTSTRAP_POLL_SECS, BOOTSTRAP_WARMUP_POLL_SECS,
    BOOTSTRAP_WARMUP_WINDOW_SECS,
};
use tokio::time::Instant;

use super::{FailureTracker, StateSlot};
use crate::health::HealthCheck;
use crate::state::WatchState;

/// Timing and threshold of the bootstrap monitor
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Failures tolerated before stopping
    pub failure_threshold: u32,
    /// Longest wait for the API to come up
    pub warmup_window: Duration,
    /// Poll interval during warm-up
    pub warmup_poll: Duration,
    /// Poll interval once warmed up
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: BOOTSTRAP_API_FAILURES_THRESHOLD,
            warmup_window: Duration::from_secs(BOOTSTRAP_WARMUP_WINDOW_SECS),
            warmup_poll: Duration::from_secs(BOOTSTRAP_WARMUP_POLL_SECS),
            poll_interval: Duration::from_secs(BOOTSTRAP_POLL_SECS),
        }
    }
}

/// Watches the local control plane on the bootstrap node
pub struct BootstrapMonitor<A, L> {
    /// Primary check, drives the failure counter
    api: A,
    /// Secondary probe, logged only
    liveness: L,
    config: MonitorConfig,
    tracker: FailureTracker,
    slot: Arc<StateSlot>,
    state: WatchState,
}

impl<A, L> BootstrapMonitor<A, L>
where
    A: HealthCheck,
    L: HealthCheck,
{
    pub fn new(
        api: A,
        liveness: L,
        config: MonitorConfig,
        slot: Arc<StateSlot>,
        state: WatchState,
    ) -> Self {
        let tracker = FailureTracker::new(config.failure_threshold);
        Self {
            api,
            liveness,
            config,
            tracker,
            slot,
            state,
        }
    }

    /// Run forever: warm up, then poll at the steady interval
    pub async fn run(mut self) {
        self.warm_up().await;

        loop {
            self.step().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Wait for the API to answer once, bounded by the warm-up window.
    ///
    /// The local kube-apiserver takes a while to start on the bootstrap node;
    /// judging it before then would stop FRR straight away. Returns whether
    /// the API came up within the window.
    pub async fn warm_up(&self) -> bool {
        tracing::info!("Verifying local kube-apiserver is operational");

        let start = Instant::now();
        while start.elapsed() < self.config.warmup_window {
            if self.api.check().await.is_ok() {
                tracing::info!("Local kube-apiserver is operational");
                return true;
            }
            tracing::info!("Local kube-apiserver not operational");
            tokio::time::sleep(self.config.warmup_poll).await;
        }

        tracing::warn!(
            window = ?self.config.warmup_window,
            "Local kube-apiserver did not become operational during warm-up"
        );
        false
    }

    /// Run one health check and publish the resulting transition, if any
    pub async fn step(&mut self) -> Option<APIState> {
        let healthy = match self.api.check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(error = %e, "Detected failure on local kube-apiserver");

                // Ironic is also reached through the API VIP; only reported
                if let Err(e) = self.liveness.check().await {
                    tracing::info!(
                        error = %e,
                        consecutive_failures = self.tracker.consecutive_failures() + 1,
                        "Detected failure on Ironic (can be ignored if platform is not baremetal)"
                    );
                }
                false
            }
        };

        let transition = self.tracker.record(healthy);
        self.state
            .set_consecutive_failures(self.tracker.consecutive_failures())
            .await;

        if let Some(state) = transition {
            match state {
                APIState::Stopped => tracing::info!(
                    consecutive_failures = self.tracker.consecutive_failures(),
                    threshold = self.tracker.threshold(),
                    "Number of failures exceeds threshold"
                ),
                APIState::Started => tracing::info!("Local kube-apiserver recovered"),
            }

            if let Some(previous) = self.slot.publish(state) {
                tracing::debug!(
                    superseded = %previous,
                    latest = %state,
                    "Pending API state superseded"
                );
            }
            self.state.record_state(state).await;
        }

        transition
    }

    #[cfg(test)]
    pub fn consecutive_failures(&self) -> u32 {
        self.tracker.consecutive_failures()
    }
}
