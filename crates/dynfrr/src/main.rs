//! # dynfrr - FRR runtime configuration watcher
//!
//! Renders the FRR configuration from cluster state and, on a bootstrap
//! node, stops FRR from advertising the VIPs once the local kube-apiserver
//! has gone away for good.
//!
//! ## Architecture
//! ```text
//! kubeconfig + cluster-config → render → frr.conf
//! kube-apiserver ← BootstrapMonitor → ControlLoop → frr.sock (stop/reload)
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use runtimecfg_common::RuntimecfgError;
use runtimecfg_common::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_SETTINGS_PATH, IS_BOOTSTRAP_ENV, IS_BOOTSTRAP_VALUE,
};

mod cluster;
mod config;
mod frr;
mod health;
mod monitor;
mod render;
mod routes;
mod state;
mod watch;

use crate::config::{Settings, WatchConfig, parse_duration};

/// Monitors runtime external interface for frr and reloads if it changes
#[derive(Parser, Debug)]
#[command(name = "dynfrr")]
#[command(author, version, about, long_about = None)]
#[command(override_usage = "dynfrr <KUBECONFIG> <TEMPLATE> <CONFIG> [OPTIONS]")]
struct Args {
    /// Path to the kubeconfig
    kubeconfig: Option<PathBuf>,

    /// Path to the FRR configuration template
    template: Option<PathBuf>,

    /// Path of the rendered FRR configuration
    config: Option<PathBuf>,

    /// Path to cluster-config ConfigMap to retrieve ControlPlane info
    #[arg(short = 'c', long)]
    cluster_config: Option<PathBuf>,

    /// Time between frr watch checks
    #[arg(long, default_value = DEFAULT_CHECK_INTERVAL, value_parser = parse_duration)]
    check_interval: Duration,

    /// Virtual IP Addresses to reach the OpenShift API
    #[arg(long, value_delimiter = ',')]
    api_vips: Vec<IpAddr>,

    /// Virtual IP Addresses to reach the OpenShift Ingress Routers
    #[arg(long, value_delimiter = ',')]
    ingress_vips: Vec<IpAddr>,

    /// Settings file path
    #[arg(long, env = "DYNFRR_SETTINGS", default_value = DEFAULT_SETTINGS_PATH)]
    settings: PathBuf,

    /// Status endpoint listen address (overrides settings)
    #[arg(long, env = "DYNFRR_STATUS_ADDR")]
    status_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // IS_BOOTSTRAP and logging variables may come from a .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level, args.json_logs) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let stage = e
                .downcast_ref::<RuntimecfgError>()
                .map(RuntimecfgError::stage)
                .unwrap_or("startup");
            tracing::error!(stage = stage, "Failed due to {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let (Some(kubeconfig), Some(template), Some(output)) =
        (args.kubeconfig.clone(), args.template.clone(), args.config.clone())
    else {
        Args::command().print_help()?;
        return Ok(());
    };

    info!("Starting dynfrr v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(&args.settings, &args)?;
    let bootstrap = std::env::var(IS_BOOTSTRAP_ENV).is_ok_and(|v| v == IS_BOOTSTRAP_VALUE);

    info!(
        kubeconfig = %kubeconfig.display(),
        template = %template.display(),
        output = %output.display(),
        bootstrap = bootstrap,
        check_interval = ?args.check_interval,
        "Configuration loaded"
    );

    watch::watch(WatchConfig {
        kubeconfig,
        template,
        output,
        cluster_config: args.cluster_config,
        check_interval: args.check_interval,
        api_vips: args.api_vips,
        ingress_vips: args.ingress_vips,
        bootstrap,
        settings,
    })
    .await
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_flags() {
        let args = Args::try_parse_from([
            "dynfrr",
            "/etc/kubernetes/kubeconfig",
            "/config/frr.conf.tmpl",
            "/etc/frr/frr.conf",
            "-c",
            "/opt/openshift/manifests/cluster-config.yaml",
            "--check-interval",
            "10s",
            "--api-vips",
            "192.168.111.5,fd2e:6f44:5dd8:c956::5",
            "--ingress-vips",
            "192.168.111.4",
        ])
        .unwrap();

        assert_eq!(args.check_interval, Duration::from_secs(10));
        assert_eq!(args.api_vips.len(), 2);
        assert_eq!(args.ingress_vips.len(), 1);
        assert!(args.cluster_config.is_some());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["dynfrr"]).unwrap();
        assert!(args.kubeconfig.is_none());
        assert_eq!(args.check_interval, Duration::from_secs(30));
        assert!(args.api_vips.is_empty());
    }

    #[test]
    fn test_args_compound_check_interval() {
        let args = Args::try_parse_from(["dynfrr", "k", "t", "c", "--check-interval", "1m30s"]).unwrap();
        assert_eq!(args.check_interval, Duration::from_secs(90));
    }

    #[test]
    fn test_args_reject_bad_vip() {
        assert!(Args::try_parse_from(["dynfrr", "k", "t", "c", "--api-vips", "not-an-ip"]).is_err());
    }

    #[tokio::test]
    async fn test_missing_positionals_prints_usage_and_succeeds() {
        let args = Args::try_parse_from(["dynfrr", "/etc/kubernetes/kubeconfig"]).unwrap();
        assert!(run(args).await.is_ok());
    }
}
