//! Cluster configuration retrieval.
//!
//! Builds the point-in-time `ClusterConfig` the FRR template is rendered
//! from:
//! - API server URL from the kubeconfig
//! - Cluster name, domain and machine networks from the cluster-config ConfigMap
//! - Upstream nameservers from resolv.conf
//! - Virtual IPs from the command line

mod kubeconfig;

pub use kubeconfig::Kubeconfig;

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;

use runtimecfg_common::{ClusterConfig, ClusterInfo, RuntimecfgError};
use serde::Deserialize;

/// Inputs to a configuration fetch
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub kubeconfig: &'a Path,
    pub cluster_config: Option<&'a Path>,
    pub resolv_conf: &'a Path,
    pub api_vips: &'a [IpAddr],
    pub ingress_vips: &'a [IpAddr],
}

/// Fetch the current cluster configuration
pub fn fetch_config(req: FetchRequest<'_>) -> Result<ClusterConfig, RuntimecfgError> {
    let endpoint = Kubeconfig::load(req.kubeconfig)?.endpoint()?;

    let cluster = match req.cluster_config {
        Some(path) => load_cluster_info(path)?,
        None => ClusterInfo::default(),
    };

    let dns_upstreams = match std::fs::read_to_string(req.resolv_conf) {
        Ok(content) => parse_nameservers(&content),
        Err(e) => {
            tracing::debug!(
                path = %req.resolv_conf.display(),
                error = %e,
                "resolv.conf not readable, no upstream nameservers"
            );
            Vec::new()
        }
    };

    Ok(ClusterConfig {
        cluster,
        api_server_url: endpoint.server,
        api_vip: req.api_vips.first().copied(),
        api_vips: req.api_vips.to_vec(),
        ingress_vip: req.ingress_vips.first().copied(),
        ingress_vips: req.ingress_vips.to_vec(),
        dns_upstreams,
    })
}

#[derive(Debug, Deserialize)]
struct ConfigMap {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallConfig {
    #[serde(default)]
    metadata: InstallMetadata,
    #[serde(default)]
    base_domain: String,
    #[serde(default)]
    networking: Networking,
}

#[derive(Debug, Default, Deserialize)]
struct InstallMetadata {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Networking {
    #[serde(default)]
    machine_network: Vec<MachineNetwork>,
}

#[derive(Debug, Deserialize)]
struct MachineNetwork {
    cidr: String,
}

/// Read cluster identity from a cluster-config ConfigMap
fn load_cluster_info(path: &Path) -> Result<ClusterInfo, RuntimecfgError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        RuntimecfgError::ClusterConfig(format!("failed to read {}: {e}", path.display()))
    })?;
    parse_cluster_info(&content)
}

fn parse_cluster_info(content: &str) -> Result<ClusterInfo, RuntimecfgError> {
    let config_map: ConfigMap = serde_yaml::from_str(content)
        .map_err(|e| RuntimecfgError::ClusterConfig(format!("invalid ConfigMap: {e}")))?;

    let raw = config_map.data.get("install-config").ok_or_else(|| {
        RuntimecfgError::ClusterConfig("ConfigMap has no install-config key".to_string())
    })?;

    let install: InstallConfig = serde_yaml::from_str(raw)
        .map_err(|e| RuntimecfgError::ClusterConfig(format!("invalid install-config: {e}")))?;

    let domain = match (install.metadata.name.is_empty(), install.base_domain.is_empty()) {
        (false, false) => format!("{}.{}", install.metadata.name, install.base_domain),
        _ => String::new(),
    };

    Ok(ClusterInfo {
        name: install.metadata.name,
        domain,
        machine_networks: install
            .networking
            .machine_network
            .into_iter()
            .map(|n| n.cidr)
            .collect(),
    })
}

fn parse_nameservers(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("nameserver"), Some(addr)) => Some(addr.to_string()),
                _ => None,
            }
        })
        .collect()
}
