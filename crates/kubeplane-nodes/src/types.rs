//! Types for the nodes crate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Kubernetes node as reported by the cluster's API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node name.
    pub name: String,
    /// Whether the `Ready` condition is `True`.
    pub ready: bool,
    /// Node pool the node belongs to, from the provider's pool label.
    pub node_pool: Option<String>,
    /// Instance type label.
    pub instance_type: Option<String>,
    /// Availability zone label.
    pub zone: Option<String>,
    /// Cluster-internal address.
    pub internal_ip: Option<String>,
    /// Public address, if any.
    pub external_ip: Option<String>,
    /// Kubelet version.
    pub kubelet_version: Option<String>,
    /// When the node registered.
    pub created_at: Option<DateTime<Utc>>,
}

/// Configuration for connecting to cluster API servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodesConfig {
    /// Connect timeout for API server requests.
    pub connect_timeout: Duration,
    /// Read timeout for API server requests.
    pub read_timeout: Duration,
    /// Node labels that name the node pool, checked in order.
    pub pool_label_keys: Vec<String>,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            pool_label_keys: vec![
                "eks.amazonaws.com/nodegroup".to_string(),
                "kubernetes.azure.com/agentpool".to_string(),
                "cloud.google.com/gke-nodepool".to_string(),
            ],
        }
    }
}

impl NodesConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `KUBEPLANE_NODES_CONNECT_TIMEOUT_SECONDS`
    /// - `KUBEPLANE_NODES_READ_TIMEOUT_SECONDS`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("KUBEPLANE_NODES_CONNECT_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.connect_timeout = Duration::from_secs(n);
            }
        }
        if let Ok(val) = std::env::var("KUBEPLANE_NODES_READ_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.read_timeout = Duration::from_secs(n);
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_cover_every_provider_label() {
        let config = NodesConfig::default();
        assert_eq!(config.pool_label_keys.len(), 3);
        assert_eq!(config.read_timeout, Duration::from_secs(30));
    }
}
