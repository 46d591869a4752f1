//! Request and response types for control plane operations.
//!
//! These types define the upward API contracts for cluster and node pool
//! management, plus the configuration threaded into every controller.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kubeplane_cloud::{CapacityType, ClusterStatus, NodePool, NodePoolStatus, ScalingConfig};
use kubeplane_core::{Ownership, Provider, Tags};
use kubeplane_nodes::NodeInfo;
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Where an operation runs: one region of one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Provider region.
    pub region: String,
    /// Provider account.
    pub account: String,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
        }
    }
}

/// Request to create a managed cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
    /// Provider tag, resolved by the dispatcher.
    pub provider: String,
    /// Provider region.
    pub region: String,
    /// Provider account.
    pub account: String,
    /// Node pool to attach once the cluster is active.
    #[serde(default)]
    pub default_node: Option<NodeSpec>,
    /// Free-form labels, applied as cluster tags.
    #[serde(default)]
    pub labels: Tags,
}

impl ClusterSpec {
    /// The location this cluster lives in.
    #[must_use]
    pub fn location(&self) -> Location {
        Location::new(self.region.clone(), self.account.clone())
    }
}

/// Request to attach a node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node pool name, unique within the cluster.
    pub name: String,
    /// Concrete provider instance type.
    #[serde(default)]
    pub instance_type: Option<String>,
    /// Abstract machine-size tag such as `m` or `m+v100`.
    #[serde(default)]
    pub machine_size: Option<String>,
    /// Root disk size.
    #[serde(default = "NodeSpec::default_disk_size_gb")]
    pub disk_size_gb: u32,
    /// Desired node count.
    #[serde(default = "NodeSpec::default_count")]
    pub count: u32,
    /// Lower scaling bound; defaults to `count`.
    #[serde(default)]
    pub min_count: Option<u32>,
    /// Upper scaling bound; defaults to `count`.
    #[serde(default)]
    pub max_count: Option<u32>,
    /// On-demand or spot capacity.
    #[serde(default)]
    pub capacity_type: CapacityType,
    /// Instance types to bid on when `capacity_type` is spot.
    #[serde(default)]
    pub spot_instance_types: Vec<String>,
    /// Whether the pool runs GPU workloads.
    #[serde(default)]
    pub gpu: bool,
    /// Kubernetes labels for the nodes.
    #[serde(default)]
    pub labels: Tags,
}

impl NodeSpec {
    const fn default_disk_size_gb() -> u32 {
        20
    }

    const fn default_count() -> u32 {
        1
    }

    /// Create a spec with a machine-size tag and default sizing.
    #[must_use]
    pub fn sized(name: impl Into<String>, machine_size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance_type: None,
            machine_size: Some(machine_size.into()),
            disk_size_gb: Self::default_disk_size_gb(),
            count: Self::default_count(),
            min_count: None,
            max_count: None,
            capacity_type: CapacityType::OnDemand,
            spot_instance_types: Vec::new(),
            gpu: false,
            labels: Tags::new(),
        }
    }

    /// The scaling bounds this spec asks for.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if the bounds are inconsistent.
    pub fn scaling(&self) -> Result<ScalingConfig> {
        let min_size = self.min_count.unwrap_or(self.count);
        let max_size = self.max_count.unwrap_or(self.count);

        if max_size == 0 {
            return Err(ControlError::Validation(format!(
                "node pool {} must allow at least one node",
                self.name
            )));
        }
        if min_size > self.count || self.count > max_size {
            return Err(ControlError::Validation(format!(
                "node pool {}: expected min {min_size} <= count {} <= max {max_size}",
                self.name, self.count
            )));
        }

        Ok(ScalingConfig {
            min_size,
            max_size,
            desired_size: self.count,
        })
    }
}

/// Response to a cluster creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterResponse {
    /// The created cluster's name.
    pub cluster_name: String,
    /// Status right after the create call.
    pub status: ClusterStatus,
}

/// Response to a cluster status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatusResponse {
    /// Current provider status.
    pub status: ClusterStatus,
}

/// A node pool as reported upward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolDescription {
    /// Node pool name.
    pub name: String,
    /// Provider status.
    pub status: NodePoolStatus,
    /// Instance types.
    pub instance_types: Vec<String>,
    /// Capacity type.
    pub capacity_type: CapacityType,
    /// Scaling bounds.
    pub scaling: ScalingConfig,
    /// Whether the provider reports no health issues.
    pub healthy: bool,
    /// Health issues reported by the provider.
    pub health_issues: Vec<String>,
}

impl From<NodePool> for NodePoolDescription {
    fn from(pool: NodePool) -> Self {
        Self {
            healthy: pool.health_issues.is_empty(),
            name: pool.name,
            status: pool.status,
            instance_types: pool.instance_types,
            capacity_type: pool.capacity_type,
            scaling: pool.scaling,
            health_issues: pool.health_issues,
        }
    }
}

/// A cluster as reported upward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescription {
    /// Cluster name.
    pub name: String,
    /// Provider.
    pub provider: Provider,
    /// Region.
    pub region: String,
    /// Provider-assigned identifier.
    pub id: String,
    /// Provider status.
    pub status: ClusterStatus,
    /// Kubernetes version.
    pub version: Option<String>,
    /// API server endpoint.
    pub endpoint: Option<String>,
    /// Node pools in scope.
    pub node_pools: Vec<NodePoolDescription>,
    /// Nodes registered with the API server, when the cluster is active.
    pub nodes: Vec<NodeInfo>,
    /// Cluster tags.
    pub tags: Tags,
}

/// Request to create a block storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Availability zone.
    pub zone: String,
    /// Size in GiB.
    pub size_gb: u32,
    /// Provider volume type.
    #[serde(default = "CreateVolumeRequest::default_volume_type")]
    pub volume_type: String,
}

impl CreateVolumeRequest {
    fn default_volume_type() -> String {
        "gp3".to_string()
    }
}

/// Billing period for a cost query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQuery {
    /// Start of the period.
    pub start: DateTime<Utc>,
    /// End of the period.
    pub end: DateTime<Utc>,
}

/// Cost report for a billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    /// Total cost.
    pub total: f64,
    /// ISO currency code.
    pub currency: String,
    /// Cost per cluster.
    pub per_cluster: BTreeMap<String, f64>,
}

/// Where credentials come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Credentials come from process configuration.
    Local,
    /// Credentials come from the secret store.
    #[default]
    Remote,
}

/// An access key pair read from process configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalCredential {
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
}

impl std::fmt::Debug for LocalCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCredential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Configuration for the control plane.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// Owner marker written to every resource.
    pub owner: String,
    /// Deployment scope marker.
    pub scope: String,
    /// Prefix for shared resource names.
    pub name_prefix: String,
    /// Where credentials come from.
    pub deployment_mode: DeploymentMode,
    /// Bound on waiting for node pool deletions during a force delete (seconds).
    pub nodepool_delete_timeout_seconds: u64,
    /// Lifetime of a resolved session (seconds).
    pub session_ttl_seconds: u64,
    /// Waits before each activation check (seconds).
    pub activation_waits_seconds: Vec<u64>,
    /// Interval between status polls (seconds).
    pub poll_interval_seconds: u64,
    /// Bound on waiting for a new network to become available (seconds).
    pub network_wait_timeout_seconds: u64,
    /// Well-known name of the cluster role.
    pub cluster_role_name: String,
    /// Well-known name of the node role.
    pub node_role_name: String,
    /// Credentials used in local mode.
    pub local_credentials: BTreeMap<Provider, LocalCredential>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            owner: "kubeplane".to_string(),
            scope: "default".to_string(),
            name_prefix: "kubeplane".to_string(),
            deployment_mode: DeploymentMode::Remote,
            nodepool_delete_timeout_seconds: 600, // 10 minutes
            session_ttl_seconds: 900,             // 15 minutes
            activation_waits_seconds: vec![360, 240, 120],
            poll_interval_seconds: 10,
            network_wait_timeout_seconds: 300,
            cluster_role_name: "kubeplane-cluster-role".to_string(),
            node_role_name: "kubeplane-node-role".to_string(),
            local_credentials: BTreeMap::new(),
        }
    }
}

impl ControlConfig {
    /// Shortest session lifetime handed out.
    pub const MIN_SESSION_TTL_SECONDS: u64 = 60;
    /// Longest session lifetime handed out.
    pub const MAX_SESSION_TTL_SECONDS: u64 = 43_200;

    /// Load configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - `KUBEPLANE_OWNER`
    /// - `KUBEPLANE_SCOPE`
    /// - `KUBEPLANE_NAME_PREFIX`
    /// - `KUBEPLANE_DEPLOYMENT_MODE` (`local` or `remote`)
    /// - `KUBEPLANE_NODEPOOL_DELETE_TIMEOUT_SECONDS`
    /// - `KUBEPLANE_SESSION_TTL_SECONDS`
    /// - `KUBEPLANE_ACTIVATION_WAITS_SECONDS` (comma separated)
    /// - `KUBEPLANE_POLL_INTERVAL_SECONDS`
    /// - `KUBEPLANE_<PROVIDER>_ACCESS_KEY` and `KUBEPLANE_<PROVIDER>_SECRET_KEY`
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("KUBEPLANE_OWNER") {
            config.owner = val;
        }
        if let Ok(val) = std::env::var("KUBEPLANE_SCOPE") {
            config.scope = val;
        }
        if let Ok(val) = std::env::var("KUBEPLANE_NAME_PREFIX") {
            config.name_prefix = val;
        }
        if let Ok(val) = std::env::var("KUBEPLANE_DEPLOYMENT_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "local" => config.deployment_mode = DeploymentMode::Local,
                "remote" => config.deployment_mode = DeploymentMode::Remote,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("KUBEPLANE_NODEPOOL_DELETE_TIMEOUT_SECONDS") {
            if let Ok(n) = val.parse() {
                config.nodepool_delete_timeout_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("KUBEPLANE_SESSION_TTL_SECONDS") {
            if let Ok(n) = val.parse() {
                config.session_ttl_seconds = n;
            }
        }
        if let Ok(val) = std::env::var("KUBEPLANE_ACTIVATION_WAITS_SECONDS") {
            let waits: std::result::Result<Vec<u64>, _> =
                val.split(',').map(|s| s.trim().parse()).collect();
            if let Ok(waits) = waits {
                if !waits.is_empty() {
                    config.activation_waits_seconds = waits;
                }
            }
        }
        if let Ok(val) = std::env::var("KUBEPLANE_POLL_INTERVAL_SECONDS") {
            if let Ok(n) = val.parse() {
                config.poll_interval_seconds = n;
            }
        }

        for provider in Provider::ALL {
            let prefix = provider.env_prefix();
            let access = std::env::var(format!("KUBEPLANE_{prefix}_ACCESS_KEY"));
            let secret = std::env::var(format!("KUBEPLANE_{prefix}_SECRET_KEY"));
            if let (Ok(access_key), Ok(secret_key)) = (access, secret) {
                config.local_credentials.insert(
                    provider,
                    LocalCredential {
                        access_key,
                        secret_key,
                    },
                );
            }
        }

        config
    }

    /// The ownership markers for this deployment.
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        Ownership::new(self.owner.clone(), self.scope.clone())
    }

    /// The session lifetime, clamped to the supported range.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds.clamp(
            Self::MIN_SESSION_TTL_SECONDS,
            Self::MAX_SESSION_TTL_SECONDS,
        ))
    }

    /// The bound on waiting for node pool deletions.
    #[must_use]
    pub const fn nodepool_delete_timeout(&self) -> Duration {
        Duration::from_secs(self.nodepool_delete_timeout_seconds)
    }

    /// The interval between status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Add a local-mode credential.
    #[must_use]
    pub fn with_local_credential(
        mut self,
        provider: Provider,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.local_credentials.insert(
            provider,
            LocalCredential {
                access_key: access_key.into(),
                secret_key: secret_key.into(),
            },
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_spec_defaults_from_json() {
        let spec: NodeSpec = serde_json::from_str(r#"{"name": "workers"}"#).unwrap();
        assert_eq!(spec.disk_size_gb, 20);
        assert_eq!(spec.count, 1);
        assert_eq!(spec.capacity_type, CapacityType::OnDemand);
        assert!(spec.instance_type.is_none());
    }

    #[test]
    fn scaling_defaults_to_count() {
        let mut spec = NodeSpec::sized("workers", "m");
        spec.count = 3;
        let scaling = spec.scaling().unwrap();
        assert_eq!(scaling.min_size, 3);
        assert_eq!(scaling.max_size, 3);
        assert_eq!(scaling.desired_size, 3);
    }

    #[test]
    fn scaling_rejects_inverted_bounds() {
        let mut spec = NodeSpec::sized("workers", "m");
        spec.count = 2;
        spec.max_count = Some(1);
        assert!(matches!(spec.scaling(), Err(ControlError::Validation(_))));

        spec.count = 0;
        spec.min_count = Some(0);
        spec.max_count = Some(0);
        assert!(matches!(spec.scaling(), Err(ControlError::Validation(_))));
    }

    #[test]
    fn control_config_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.deployment_mode, DeploymentMode::Remote);
        assert_eq!(config.activation_waits_seconds, vec![360, 240, 120]);
        assert_eq!(config.nodepool_delete_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn session_ttl_is_clamped() {
        let config = ControlConfig {
            session_ttl_seconds: 5,
            ..ControlConfig::default()
        };
        assert_eq!(config.session_ttl(), Duration::from_secs(60));

        let config = ControlConfig {
            session_ttl_seconds: 1_000_000,
            ..ControlConfig::default()
        };
        assert_eq!(config.session_ttl(), Duration::from_secs(43_200));
    }

    #[test]
    fn local_credential_debug_hides_secret() {
        let config = ControlConfig::default().with_local_credential(Provider::Aws, "AKIA", "s3cr3t");
        let debug = format!("{config:?}");
        assert!(debug.contains("AKIA"));
        assert!(!debug.contains("s3cr3t"));
    }
}
