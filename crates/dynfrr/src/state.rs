//! Shared watch status.

use std::sync::Arc;
use tokio::sync::RwLock;

use runtimecfg_common::{APIState, ControlCommand, WatchStatus};

/// Status shared between the monitor, the control loop and the status routes
#[derive(Clone, Debug)]
pub struct WatchState {
    status: Arc<RwLock<WatchStatus>>,
}

impl WatchState {
    pub fn new(bootstrap: bool, failure_threshold: u32) -> Self {
        Self {
            status: Arc::new(RwLock::new(WatchStatus::new(bootstrap, failure_threshold))),
        }
    }

    /// Copy of the current status
    pub async fn snapshot(&self) -> WatchStatus {
        self.status.read().await.clone()
    }

    pub async fn set_consecutive_failures(&self, failures: u32) {
        self.status.write().await.consecutive_failures = failures;
    }

    pub async fn record_state(&self, state: APIState) {
        self.status.write().await.record_state(state);
    }

    pub async fn record_command(&self, command: ControlCommand) {
        self.status.write().await.record_command(command);
    }
}
