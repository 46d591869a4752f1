//! Error types for the nodes crate.

use thiserror::Error;

/// Errors that can occur while reading a cluster's nodes.
#[derive(Error, Debug)]
pub enum NodesError {
    /// Kubernetes API error.
    #[error("Kubernetes API error: {0}")]
    KubeApi(#[from] kube::Error),

    /// The kubeconfig document could not be parsed or resolved.
    #[error("Invalid kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl NodesError {
    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::KubeApi(_))
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Kubeconfig(_) | Self::Config(_) => 500,
            Self::KubeApi(_) => 503,
        }
    }
}

/// A specialized Result type for node listing.
pub type Result<T> = std::result::Result<T, NodesError>;
