//! Core types shared across runtimecfg components.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Belief about whether the local control-plane endpoint is healthy enough
/// for the routing daemon to keep advertising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum APIState {
    /// Control plane recovered after a reported outage
    Started,
    /// Control plane failed past the threshold
    Stopped,
}

impl fmt::Display for APIState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => f.write_str("started"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Command understood by the FRR container control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    /// Stop advertising routes
    Stop,
    /// Reload configuration and resume advertising
    Reload,
}

impl ControlCommand {
    /// Command keyword without the line terminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Reload => "reload",
        }
    }

    /// Exact bytes written to the control socket
    pub fn wire_bytes(&self) -> &'static [u8] {
        match self {
            Self::Stop => b"stop\n",
            Self::Reload => b"reload\n",
        }
    }
}

impl From<APIState> for ControlCommand {
    fn from(state: APIState) -> Self {
        match state {
            APIState::Stopped => Self::Stop,
            _ => Self::Reload,
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of cluster configuration used to render the
/// routing daemon configuration.
///
/// Field names are serialized in the capitalized form templates address
/// them by (`{{ .Cluster.Name }}`, `{{ .APIVips }}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterConfig {
    /// Cluster identity
    pub cluster: ClusterInfo,

    /// API server URL from the kubeconfig's current context
    #[serde(rename = "APIServerURL")]
    pub api_server_url: String,

    /// Primary API virtual IP (first of `api_vips`)
    #[serde(rename = "APIVip")]
    pub api_vip: Option<IpAddr>,

    /// All API virtual IPs
    #[serde(rename = "APIVips")]
    pub api_vips: Vec<IpAddr>,

    /// Primary ingress virtual IP (first of `ingress_vips`)
    pub ingress_vip: Option<IpAddr>,

    /// All ingress virtual IPs
    pub ingress_vips: Vec<IpAddr>,

    /// Upstream nameservers from resolv.conf
    #[serde(rename = "DNSUpstreams")]
    pub dns_upstreams: Vec<String>,
}

/// Cluster identity taken from the install-config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterInfo {
    pub name: String,
    pub domain: String,
    pub machine_networks: Vec<String>,
}

/// Status snapshot reported by the status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchStatus {
    /// Running on a bootstrap node
    pub bootstrap: bool,

    /// Last state emitted by the bootstrap monitor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_state: Option<APIState>,

    /// Current run of failed health checks
    pub consecutive_failures: u32,

    /// Failures tolerated before stopping
    pub failure_threshold: u32,

    /// When `api_state` last changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<DateTime<Utc>>,

    /// Commands delivered to the control socket
    pub commands_sent: u64,

    /// Most recently delivered command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command: Option<ControlCommand>,
}

impl WatchStatus {
    pub fn new(bootstrap: bool, failure_threshold: u32) -> Self {
        Self {
            bootstrap,
            failure_threshold,
            ..Default::default()
        }
    }

    /// Record a state emitted by the monitor
    pub fn record_state(&mut self, state: APIState) {
        if self.api_state != Some(state) {
            self.last_transition = Some(Utc::now());
        }
        self.api_state = Some(state);
    }

    /// Record a command delivered to the control socket
    pub fn record_command(&mut self, command: ControlCommand) {
        self.commands_sent += 1;
        self.last_command = Some(command);
    }
}
