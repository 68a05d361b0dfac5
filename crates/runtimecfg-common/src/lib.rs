//! # Runtimecfg Common
//!
//! Shared types, errors, and constants used by the runtimecfg daemons.
//!
//! ## Modules
//! - `types` - Control-plane state, control commands, cluster configuration
//! - `error` - Common error taxonomy
//! - `constants` - Well-known paths, thresholds, and timings

pub mod constants;
pub mod error;
pub mod types;

pub use error::RuntimecfgError;
pub use types::*;
