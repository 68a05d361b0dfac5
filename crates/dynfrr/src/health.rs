//! Control-plane health checks.
//!
//! - `ApiServerCheck` asks the local kube-apiserver for `/readyz` using the
//!   credentials of the kubeconfig.
//! - `LivenessProbe` is a plain GET where any HTTP answer counts as alive.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use runtimecfg_common::RuntimecfgError;
use runtimecfg_common::constants::API_READYZ_PATH;

use crate::cluster::Kubeconfig;

/// A probe that succeeds while its target is healthy
pub trait HealthCheck: Send + Sync + 'static {
    fn check(&self) -> impl Future<Output = Result<(), RuntimecfgError>> + Send;
}

/// kube-apiserver readiness check
#[derive(Debug, Clone)]
pub struct ApiServerCheck {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl ApiServerCheck {
    /// Build a check against the API server of the kubeconfig's current context
    pub fn from_kubeconfig(path: &Path, timeout: Duration) -> Result<Self, RuntimecfgError> {
        let endpoint = Kubeconfig::load(path)?.endpoint()?;
        let mut builder = reqwest::Client::builder().timeout(timeout);

        if let Some(ca) = &endpoint.ca_pem {
            let cert = reqwest::Certificate::from_pem(ca)
                .map_err(|e| RuntimecfgError::Kubeconfig(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if endpoint.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(pem) = &endpoint.identity_pem {
            let identity = reqwest::Identity::from_pem(pem).map_err(|e| {
                RuntimecfgError::Kubeconfig(format!("invalid client certificate: {e}"))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| RuntimecfgError::Kubeconfig(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}{}", endpoint.server, API_READYZ_PATH),
            token: endpoint.token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthCheck for ApiServerCheck {
    fn check(&self) -> impl Future<Output = Result<(), RuntimecfgError>> + Send {
        async move {
            let mut request = self.client.get(&self.url);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| RuntimecfgError::HealthCheck(format!("{}: {e}", self.url)))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(RuntimecfgError::HealthCheck(format!(
                    "{} returned {status}",
                    self.url
                )))
            }
        }
    }
}

/// Best-effort liveness probe
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    client: reqwest::Client,
    url: String,
}

impl LivenessProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RuntimecfgError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuntimecfgError::Settings(format!("failed to build probe client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl HealthCheck for LivenessProbe {
    fn check(&self) -> impl Future<Output = Result<(), RuntimecfgError>> + Send {
        async move {
            // Any status code means something is answering
            self.client
                .get(&self.url)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| RuntimecfgError::HealthCheck(format!("{}: {e}", self.url)))
        }
    }
}
