//! Configuration management for dynfrr.
//!
//! Positional paths and VIPs come from the command line. Tunables live in an
//! optional settings file (TOML), can be overridden with `DYNFRR_*`
//! environment variables, and finally by CLI flags.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use runtimecfg_common::constants::{
    BOOTSTRAP_API_FAILURES_THRESHOLD, BOOTSTRAP_POLL_SECS, BOOTSTRAP_WARMUP_POLL_SECS,
    BOOTSTRAP_WARMUP_WINDOW_SECS, COMMAND_QUIESCENCE_SECS, CONTROL_RETRY_SECS, FRR_CONTROL_SOCK,
    IRONIC_LIVENESS_URL, PROBE_TIMEOUT_SECS, RESOLV_CONF_PATH,
};

use crate::monitor::MonitorConfig;

/// Tunables loaded from the settings file
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Failed API checks tolerated before stopping FRR
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Longest wait for the bootstrap API to come up
    #[serde(default = "default_warmup_window")]
    pub warmup_window_secs: u64,

    /// Poll interval while waiting for the API
    #[serde(default = "default_warmup_poll")]
    pub warmup_poll_secs: u64,

    /// Steady-state poll interval of the monitor
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Pause after each delivered command
    #[serde(default = "default_quiescence")]
    pub quiescence_secs: u64,

    /// Wait between failed control socket writes
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// FRR control socket path
    #[serde(default = "default_control_socket")]
    pub control_socket: String,

    /// Secondary liveness endpoint probed on API failure
    #[serde(default = "default_liveness_url")]
    pub liveness_url: String,

    /// Timeout of a single probe
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Resolver configuration for upstream DNS servers
    #[serde(default = "default_resolv_conf")]
    pub resolv_conf: PathBuf,

    /// Listen address of the status endpoint (disabled when unset)
    #[serde(default)]
    pub status_addr: Option<String>,
}

// Default value functions
fn default_failure_threshold() -> u32 { BOOTSTRAP_API_FAILURES_THRESHOLD }
fn default_warmup_window() -> u64 { BOOTSTRAP_WARMUP_WINDOW_SECS }
fn default_warmup_poll() -> u64 { BOOTSTRAP_WARMUP_POLL_SECS }
fn default_poll_interval() -> u64 { BOOTSTRAP_POLL_SECS }
fn default_quiescence() -> u64 { COMMAND_QUIESCENCE_SECS }
fn default_retry_interval() -> u64 { CONTROL_RETRY_SECS }
fn default_control_socket() -> String { FRR_CONTROL_SOCK.to_string() }
fn default_liveness_url() -> String { IRONIC_LIVENESS_URL.to_string() }
fn default_probe_timeout() -> u64 { PROBE_TIMEOUT_SECS }
fn default_resolv_conf() -> PathBuf { PathBuf::from(RESOLV_CONF_PATH) }

impl Default for Settings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            warmup_window_secs: default_warmup_window(),
            warmup_poll_secs: default_warmup_poll(),
            poll_interval_secs: default_poll_interval(),
            quiescence_secs: default_quiescence(),
            retry_interval_secs: default_retry_interval(),
            control_socket: default_control_socket(),
            liveness_url: default_liveness_url(),
            probe_timeout_secs: default_probe_timeout(),
            resolv_conf: default_resolv_conf(),
            status_addr: None,
        }
    }
}

impl Settings {
    /// Load settings from file, with environment and CLI overrides
    pub fn load(settings_path: &Path, args: &super::Args) -> Result<Self> {
        Self::load_with_env(
            settings_path,
            args,
            config::Environment::with_prefix("DYNFRR").try_parsing(true),
        )
    }

    fn load_with_env(
        settings_path: &Path,
        args: &super::Args,
        env: config::Environment,
    ) -> Result<Self> {
        if !settings_path.exists() {
            tracing::debug!(
                path = %settings_path.display(),
                "Settings file not found, using defaults"
            );
        }

        let mut settings: Self = config::Config::builder()
            .add_source(
                config::File::new(&settings_path.to_string_lossy(), config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(env)
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Failed to parse settings")?;

        if let Some(ref addr) = args.status_addr {
            settings.status_addr = Some(addr.clone());
        }

        Ok(settings)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            failure_threshold: self.failure_threshold,
            warmup_window: Duration::from_secs(self.warmup_window_secs),
            warmup_poll: Duration::from_secs(self.warmup_poll_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_secs(self.quiescence_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Everything the control loop needs to start
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub kubeconfig: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
    pub cluster_config: Option<PathBuf>,
    pub check_interval: Duration,
    pub api_vips: Vec<IpAddr>,
    pub ingress_vips: Vec<IpAddr>,
    /// Running on the bootstrap node
    pub bootstrap: bool,
    pub settings: Settings,
}

/// Parse durations such as `30s`, `1m30s`, `500ms`, `1.5s` or bare seconds
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    humantime::parse_duration(s).or_else(|e| {
        parse_fractional(s).ok_or_else(|| format!("invalid duration '{s}': {e}"))
    })
}

/// Single term with a fractional count (`1.5s`, `0.5m`), or a bare number of seconds
fn parse_fractional(s: &str) -> Option<Duration> {
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let count: f64 = number.parse().ok()?;
    let scale = match unit {
        "" | "s" => 1.0,
        "ms" => 0.001,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return None,
    };
    Duration::try_from_secs_f64(count * scale).ok()
}
