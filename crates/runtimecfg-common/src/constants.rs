//! Shared constants for runtimecfg components.

/// FRR container control socket
pub const FRR_CONTROL_SOCK: &str = "/var/run/frr/frr.sock";

/// Environment variable selecting the bootstrap role
pub const IS_BOOTSTRAP_ENV: &str = "IS_BOOTSTRAP";

/// Value of `IS_BOOTSTRAP_ENV` that activates the bootstrap monitor
pub const IS_BOOTSTRAP_VALUE: &str = "yes";

/// Failed API checks tolerated on the bootstrap before stopping
pub const BOOTSTRAP_API_FAILURES_THRESHOLD: u32 = 30;

/// How long to wait for the local kube-apiserver to come up (seconds)
pub const BOOTSTRAP_WARMUP_WINDOW_SECS: u64 = 60;

/// Poll interval while waiting for the local kube-apiserver (seconds)
pub const BOOTSTRAP_WARMUP_POLL_SECS: u64 = 3;

/// Steady-state poll interval of the bootstrap monitor (seconds)
pub const BOOTSTRAP_POLL_SECS: u64 = 1;

/// Pause after each delivered command (seconds)
pub const COMMAND_QUIESCENCE_SECS: u64 = 5;

/// Spacing between control socket write attempts (seconds)
pub const CONTROL_RETRY_SECS: u64 = 1;

/// Default interval between control loop checks
pub const DEFAULT_CHECK_INTERVAL: &str = "30s";

/// Ironic API, reachable through the API VIP on baremetal
pub const IRONIC_LIVENESS_URL: &str = "http://localhost:6385/v1";

/// Timeout for a single health or liveness probe (seconds)
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Resolver configuration consulted for upstream DNS servers
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";

/// Default settings file for dynfrr
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/dynfrr/dynfrr.toml";

/// kube-apiserver readiness endpoint
pub const API_READYZ_PATH: &str = "/readyz";
