//! Common error types for runtimecfg components.

use thiserror::Error;

/// Common errors across runtimecfg components
#[derive(Debug, Error)]
pub enum RuntimecfgError {
    /// Settings file or CLI value could not be used
    #[error("Settings error: {0}")]
    Settings(String),

    /// Kubeconfig could not be read or is unusable
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(String),

    /// Cluster configuration could not be retrieved
    #[error("Cluster config error: {0}")]
    ClusterConfig(String),

    /// Template rendering failed
    #[error("Render error: {0}")]
    Render(String),

    /// Control socket could not be opened or written
    #[error("Control socket error: {0}")]
    ControlSocket(String),

    /// Control-plane health check failed
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// Filesystem or socket I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimecfgError {
    /// Returns the startup stage this error belongs to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Settings(_) => "settings",
            Self::Kubeconfig(_) | Self::ClusterConfig(_) => "config-fetch",
            Self::Render(_) => "render",
            Self::ControlSocket(_) => "control-connect",
            Self::HealthCheck(_) => "health-check",
            Self::Io(_) => "io",
        }
    }

    /// Returns true if this error must abort the process
    ///
    /// Health-check failures are monitor input and never fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::HealthCheck(_))
    }
}
