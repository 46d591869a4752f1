//! Resource shapes exchanged with a cloud provider.

use kubeplane_core::{RequestToken, Tags};
use serde::{Deserialize, Serialize};

/// Selects resources by name and tags.
///
/// A resource matches when its name equals `name` (if set) and it carries
/// every key/value pair in `tags`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Exact name to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tags the resource must carry.
    #[serde(default)]
    pub tags: Tags,
}

impl ResourceFilter {
    /// Filter on tags only.
    #[must_use]
    pub fn tagged(tags: Tags) -> Self {
        Self { name: None, tags }
    }

    /// Filter on a name and tags.
    #[must_use]
    pub fn named(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: Some(name.into()),
            tags,
        }
    }

    /// Whether a resource with this name and these tags passes the filter.
    #[must_use]
    pub fn matches(&self, name: Option<&str>, tags: &Tags) -> bool {
        if let Some(wanted) = &self.name {
            if name != Some(wanted.as_str()) {
                return false;
            }
        }
        self.tags.iter().all(|(k, v)| tags.get(k) == Some(v))
    }
}

/// Availability state of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    /// Still being allocated.
    Pending,
    /// Ready for subnets and gateways.
    Available,
}

/// A regional virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Provider identifier.
    pub id: String,
    /// Name tag.
    pub name: String,
    /// Address block.
    pub cidr: String,
    /// Current state.
    pub state: NetworkState,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// An internet gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    /// Provider identifier.
    pub id: String,
    /// Network the gateway is attached to, if any.
    #[serde(default)]
    pub network_id: Option<String>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// A route in a route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Destination block, e.g. `0.0.0.0/0`.
    pub destination: String,
    /// Gateway the traffic is sent to.
    pub gateway_id: String,
}

/// The binding of a route table to a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableAssociation {
    /// Provider identifier of the association.
    pub id: String,
    /// Associated subnet.
    pub subnet_id: String,
}

/// A network route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTable {
    /// Provider identifier.
    pub id: String,
    /// Network the table belongs to.
    pub network_id: String,
    /// Whether this is the network's main table, which cannot be deleted.
    #[serde(default)]
    pub main: bool,
    /// Routes in the table.
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Subnet associations.
    #[serde(default)]
    pub associations: Vec<RouteTableAssociation>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// A subnet in one availability zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Provider identifier.
    pub id: String,
    /// Network the subnet belongs to.
    pub network_id: String,
    /// Address block.
    pub cidr: String,
    /// Availability zone.
    pub zone: String,
    /// Whether instances get a public address at launch.
    #[serde(default)]
    pub map_public_ip: bool,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// An identity role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role name.
    pub name: String,
    /// Provider identifier (ARN, principal ID, service account).
    pub id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Policies attached to the role.
    #[serde(default)]
    pub attached_policies: Vec<String>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// Input for creating a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoleInput {
    /// Role name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Trust policy document.
    pub trust_policy: serde_json::Value,
    /// Tags to apply.
    pub tags: Tags,
}

/// Lifecycle status of a managed cluster, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    /// Control plane is being created.
    Creating,
    /// Control plane is running.
    Active,
    /// Control plane is being deleted.
    Deleting,
    /// Creation or an update failed.
    Failed,
    /// The provider reported something else.
    #[serde(other)]
    Unknown,
}

impl ClusterStatus {
    /// The upper-case wire form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Deleting => "DELETING",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A managed Kubernetes control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedCluster {
    /// Cluster name.
    pub name: String,
    /// Provider identifier.
    pub id: String,
    /// Current status.
    pub status: ClusterStatus,
    /// Kubernetes version.
    #[serde(default)]
    pub version: Option<String>,
    /// API server endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Role the control plane runs as.
    pub role_id: String,
    /// Subnets the control plane is attached to.
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// Input for creating a managed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateClusterInput {
    /// Cluster name.
    pub name: String,
    /// Role the control plane runs as.
    pub role_id: String,
    /// Subnets to attach.
    pub subnet_ids: Vec<String>,
    /// Tags to apply.
    pub tags: Tags,
    /// Idempotency token.
    pub request_token: RequestToken,
}

/// Purchase model for node pool instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacityType {
    /// Regular instances.
    #[default]
    OnDemand,
    /// Interruptible discounted instances.
    Spot,
}

/// Size bounds of a node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Minimum node count.
    pub min_size: u32,
    /// Maximum node count.
    pub max_size: u32,
    /// Desired node count.
    pub desired_size: u32,
}

/// Lifecycle status of a node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodePoolStatus {
    /// Nodes are being launched.
    Creating,
    /// Pool is serving.
    Active,
    /// Pool is being changed.
    Updating,
    /// Pool is being deleted.
    Deleting,
    /// Creation failed.
    CreateFailed,
    /// Deletion failed.
    DeleteFailed,
    /// Pool is running with health issues.
    Degraded,
    /// The provider reported something else.
    #[serde(other)]
    Unknown,
}

/// A managed node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePool {
    /// Pool name.
    pub name: String,
    /// Cluster the pool belongs to.
    pub cluster: String,
    /// Current status.
    pub status: NodePoolStatus,
    /// Role the nodes run as.
    pub role_id: String,
    /// Subnets nodes launch into.
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    /// Node image release version.
    #[serde(default)]
    pub release_version: Option<String>,
    /// Instance types.
    #[serde(default)]
    pub instance_types: Vec<String>,
    /// Purchase model.
    #[serde(default)]
    pub capacity_type: CapacityType,
    /// Root disk size in GiB.
    pub disk_size_gb: u32,
    /// Size bounds.
    pub scaling: ScalingConfig,
    /// Kubernetes labels applied to nodes.
    #[serde(default)]
    pub labels: Tags,
    /// Health issues reported by the provider.
    #[serde(default)]
    pub health_issues: Vec<String>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// Input for creating a node pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateNodePoolInput {
    /// Cluster to attach to.
    pub cluster: String,
    /// Pool name.
    pub name: String,
    /// Role the nodes run as.
    pub role_id: String,
    /// Subnets nodes launch into.
    pub subnet_ids: Vec<String>,
    /// Node image release version, or the cluster default.
    pub release_version: Option<String>,
    /// Instance types.
    pub instance_types: Vec<String>,
    /// Purchase model.
    pub capacity_type: CapacityType,
    /// Root disk size in GiB.
    pub disk_size_gb: u32,
    /// Size bounds.
    pub scaling: ScalingConfig,
    /// Kubernetes labels applied to nodes.
    pub labels: Tags,
    /// Tags to apply.
    pub tags: Tags,
    /// Idempotency token.
    pub request_token: RequestToken,
}

/// State of a block storage volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeState {
    /// Being created.
    Creating,
    /// Ready to attach.
    Available,
    /// Attached to an instance.
    InUse,
    /// Being deleted.
    Deleting,
    /// Something went wrong.
    Error,
}

/// A block storage volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    /// Provider identifier.
    pub id: String,
    /// Availability zone.
    pub zone: String,
    /// Size in GiB.
    pub size_gb: u32,
    /// Provider volume type, e.g. `gp3`.
    pub volume_type: String,
    /// Current state.
    pub state: VolumeState,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}

/// Input for creating a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeInput {
    /// Availability zone.
    pub zone: String,
    /// Size in GiB.
    pub size_gb: u32,
    /// Provider volume type.
    pub volume_type: String,
    /// Tags to apply.
    pub tags: Tags,
}

/// State of a volume snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    /// Copy in progress.
    Pending,
    /// Copy finished.
    Completed,
    /// Copy failed.
    Error,
}

/// A point-in-time copy of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Provider identifier.
    pub id: String,
    /// Source volume.
    pub volume_id: String,
    /// Current state.
    pub state: SnapshotState,
    /// Resource tags.
    #[serde(default)]
    pub tags: Tags,
}
