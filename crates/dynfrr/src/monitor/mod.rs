//! Bootstrap control-plane monitoring.
//!
//! Samples kube-apiserver health, debounces failures against a threshold
//! and hands the resulting `APIState` to the control loop through a
//! single-slot cell.

mod bootstrap;
mod slot;
mod tracker;

pub use bootstrap::{BootstrapMonitor, MonitorConfig};
pub use slot::StateSlot;
pub use tracker::FailureTracker;
