//! Single-slot hand-off of the latest `APIState`.
//!
//! The monitor must never stall on a slow control loop, and the control loop
//! only cares about the most recent state. A publish therefore replaces any
//! value the consumer has not taken yet.

use std::sync::Mutex;

use runtimecfg_common::APIState;
use tokio::sync::Notify;

/// Latest-value cell shared between the monitor and the control loop
#[derive(Debug, Default)]
pub struct StateSlot {
    pending: Mutex<Option<APIState>>,
    notify: Notify,
}

impl StateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state`, replacing any pending value. Never blocks.
    ///
    /// Returns the value that was superseded, if any.
    pub fn publish(&self, state: APIState) -> Option<APIState> {
        let superseded = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.replace(state)
        };
        self.notify.notify_one();
        superseded
    }

    /// Take the pending value without waiting
    pub fn try_take(&self) -> Option<APIState> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    /// Wait until a value is pending and take it
    ///
    /// Cancel safe: a value is only removed from the slot once it is returned.
    pub async fn recv(&self) -> APIState {
        loop {
            let notified = self.notify.notified();
            if let Some(state) = self.try_take() {
                return state;
            }
            notified.await;
        }
    }

    /// Whether a value is waiting to be taken
    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
