//! Node pool lifecycle.
//!
//! A new node pool is derived one of two ways. When the cluster already has
//! a pool, the new one clones its role, subnets and release version. When it
//! has none, the node role is ensured and the cluster's own subnets are
//! used. Each call takes exactly one of the two paths.

use kubeplane_cloud::{
    CapacityType, CloudApi, CloudError, ClusterStatus, ContainerApi, CreateNodePoolInput,
    IdentityApi, ManagedCluster, NodePool, Session,
};
use kubeplane_core::tags::{NAME_KEY, SCOPE_KEY};
use kubeplane_core::{validate_name, Ownership, Provider, RequestToken, Tags};
use tracing::{debug, info};

use crate::catalog;
use crate::error::{ControlError, Result};
use crate::identity::{attach_policies, ensure_role};
use crate::profile::ProviderProfile;
use crate::session::request_token;
use crate::types::{ControlConfig, NodeSpec};

/// Node label set on GPU pools.
pub const GPU_LABEL: &str = "kubeplane.io/gpu";

/// Pick the capacity type and instance types for a node spec.
///
/// Spot pools use the caller's spot list and ignore the machine-size tag.
/// On-demand pools use `instance_type`, falling back to the catalog entry
/// for `machine_size`.
///
/// # Errors
///
/// Returns `ControlError::Validation` if no instance type results.
pub fn resolve_instance(
    provider: Provider,
    spec: &NodeSpec,
) -> Result<(CapacityType, Vec<String>)> {
    match spec.capacity_type {
        CapacityType::Spot => {
            let types: Vec<String> = spec
                .spot_instance_types
                .iter()
                .filter(|t| !t.is_empty())
                .cloned()
                .collect();
            if types.is_empty() {
                return Err(ControlError::Validation(format!(
                    "spot node pool {} needs at least one spot instance type",
                    spec.name
                )));
            }
            Ok((CapacityType::Spot, types))
        }
        CapacityType::OnDemand => {
            if let Some(instance_type) = spec.instance_type.as_deref().filter(|t| !t.is_empty()) {
                return Ok((CapacityType::OnDemand, vec![instance_type.to_string()]));
            }
            let Some(size) = spec.machine_size.as_deref() else {
                return Err(ControlError::Validation(format!(
                    "node pool {} needs an instance type or a machine size",
                    spec.name
                )));
            };
            let instance_type = catalog::lookup(provider, size).ok_or_else(|| {
                ControlError::Validation(format!(
                    "machine size {size} is not available on {provider}"
                ))
            })?;
            Ok((CapacityType::OnDemand, vec![instance_type.to_string()]))
        }
    }
}

/// Where a new pool's role, subnets and release version come from.
struct Placement {
    role_id: String,
    subnet_ids: Vec<String>,
    release_version: Option<String>,
}

/// Derives, creates and deletes node pools for one provider.
pub struct NodePoolManager {
    provider: Provider,
    ownership: Ownership,
    profile: ProviderProfile,
    node_role_name: String,
}

impl NodePoolManager {
    /// Create a manager for one provider.
    #[must_use]
    pub fn new(config: &ControlConfig, profile: ProviderProfile) -> Self {
        Self {
            provider: profile.provider,
            ownership: config.ownership(),
            profile,
            node_role_name: config.node_role_name.clone(),
        }
    }

    /// Check a node spec without calling the cloud.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` or `ControlError::Core` describing
    /// the first problem found.
    pub fn validate(&self, spec: &NodeSpec) -> Result<()> {
        validate_name("node pool", &spec.name)?;
        if spec.disk_size_gb == 0 {
            return Err(ControlError::Validation(format!(
                "node pool {} needs a non-zero disk size",
                spec.name
            )));
        }
        spec.scaling()?;
        resolve_instance(self.provider, spec)?;
        Ok(())
    }

    fn build_input(
        &self,
        session: &Session,
        cluster: &str,
        spec: &NodeSpec,
        placement: Placement,
    ) -> Result<CreateNodePoolInput> {
        let (capacity_type, instance_types) = resolve_instance(self.provider, spec)?;
        let scaling = spec.scaling()?;

        let mut labels = spec.labels.clone();
        let gpu = spec.gpu || spec.machine_size.as_deref().is_some_and(catalog::is_gpu_size);
        if gpu {
            labels.insert(GPU_LABEL.to_string(), "true".to_string());
        }

        let mut tags: Tags = self.ownership.tags();
        tags.insert(NAME_KEY.to_string(), spec.name.clone());

        let mut input = CreateNodePoolInput {
            cluster: cluster.to_string(),
            name: spec.name.clone(),
            role_id: placement.role_id,
            subnet_ids: placement.subnet_ids,
            release_version: placement.release_version,
            instance_types,
            capacity_type,
            disk_size_gb: spec.disk_size_gb,
            scaling,
            labels,
            tags,
            request_token: RequestToken::derive(&[]),
        };
        input.request_token = request_token("create-node-pool", session, &input)?;
        Ok(input)
    }

    /// Derive a pool from an existing one: role, subnets and release version
    /// are copied; name, instances, disk and scaling come from `spec`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::Validation` if `spec` doesn't resolve.
    pub fn derive_from_default(
        &self,
        session: &Session,
        existing: &NodePool,
        cluster: &str,
        spec: &NodeSpec,
    ) -> Result<CreateNodePoolInput> {
        debug!(cluster, pool = %spec.name, from = %existing.name, "Deriving node pool from existing pool");
        self.build_input(
            session,
            cluster,
            spec,
            Placement {
                role_id: existing.role_id.clone(),
                subnet_ids: existing.subnet_ids.clone(),
                release_version: existing.release_version.clone(),
            },
        )
    }

    /// Derive the first pool of a cluster: the node role is ensured (its
    /// worker policies attached only when freshly created) and the cluster's
    /// subnets are used.
    ///
    /// # Errors
    ///
    /// Returns role provisioning errors or `ControlError::Validation`.
    pub async fn derive_from_cluster<A: IdentityApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
        cluster: &ManagedCluster,
        spec: &NodeSpec,
    ) -> Result<CreateNodePoolInput> {
        debug!(cluster = %cluster.name, pool = %spec.name, "Deriving node pool from cluster");

        let (role, created) = ensure_role(
            api,
            session,
            &self.ownership,
            &self.node_role_name,
            "Worker nodes of kubeplane-managed clusters",
            self.profile.node_trust_policy(),
        )
        .await?;
        if created {
            attach_policies(api, session, &role.name, &self.profile.worker_policies).await?;
        }

        self.build_input(
            session,
            &cluster.name,
            spec,
            Placement {
                role_id: role.id,
                subnet_ids: cluster.subnet_ids.clone(),
                release_version: None,
            },
        )
    }

    /// Attach a node pool to an active cluster.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ClusterNotActive` unless the cluster is
    /// ACTIVE, and `ControlError::NodeGroupExists` without calling create if
    /// the name is taken.
    pub async fn add_node<A: CloudApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
        cluster_name: &str,
        spec: &NodeSpec,
    ) -> Result<NodePool> {
        self.validate(spec)?;

        let cluster = api
            .describe_cluster(session, cluster_name)
            .await
            .map_err(|e| cluster_error(e, cluster_name))?;
        if cluster.status != ClusterStatus::Active {
            return Err(ControlError::ClusterNotActive {
                name: cluster_name.to_string(),
                status: cluster.status,
            });
        }

        let pools = api.list_node_pools(session, cluster_name).await?;
        if pools.iter().any(|p| *p == spec.name) {
            return Err(ControlError::NodeGroupExists {
                cluster: cluster_name.to_string(),
                pool: spec.name.clone(),
            });
        }

        let input = match pools.first() {
            None => self.derive_from_cluster(api, session, &cluster, spec).await?,
            Some(first) => {
                let existing = api.describe_node_pool(session, cluster_name, first).await?;
                self.derive_from_default(session, &existing, cluster_name, spec)?
            }
        };

        let pool = api.create_node_pool(session, &input).await?;
        info!(
            cluster = cluster_name,
            pool = %pool.name,
            instance_types = ?pool.instance_types,
            capacity_type = ?pool.capacity_type,
            desired = pool.scaling.desired_size,
            "Created node pool"
        );
        Ok(pool)
    }

    /// Request deletion of a node pool in this deployment's scope. Returns
    /// as soon as the provider accepts the request.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ScopeMismatch` without deleting if the pool's
    /// scope tag differs from the configured scope.
    pub async fn delete_node<A: ContainerApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
        cluster: &str,
        pool: &str,
    ) -> Result<()> {
        let found = api
            .describe_node_pool(session, cluster, pool)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    ControlError::NodeGroupNotFound {
                        cluster: cluster.to_string(),
                        pool: pool.to_string(),
                    }
                } else {
                    e.into()
                }
            })?;

        if !self.ownership.in_scope(&found.tags) {
            return Err(ControlError::ScopeMismatch {
                kind: "node pool",
                name: pool.to_string(),
                expected: self.ownership.scope().to_string(),
                found: found.tags.get(SCOPE_KEY).cloned(),
            });
        }

        api.delete_node_pool(session, cluster, pool).await?;
        info!(cluster, pool, "Requested node pool deletion");
        Ok(())
    }
}

/// Map a cluster lookup error, turning not-found into `ClusterNotFound`.
pub(crate) fn cluster_error(error: CloudError, name: &str) -> ControlError {
    if error.is_not_found() {
        ControlError::ClusterNotFound(name.to_string())
    } else {
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeplane_cloud::{MockCloud, NodePoolStatus, Role, ScalingConfig};

    const REGION: &str = "us-east-1";

    fn session() -> Session {
        Session::new(
            Provider::Aws,
            REGION,
            "123456789012",
            "AKIA",
            "secret",
            chrono::Duration::minutes(15),
        )
    }

    fn config() -> ControlConfig {
        ControlConfig {
            scope: "test".to_string(),
            ..ControlConfig::default()
        }
    }

    fn manager() -> NodePoolManager {
        NodePoolManager::new(&config(), ProviderProfile::for_provider(Provider::Aws))
    }

    fn active_cluster(cloud: &MockCloud) {
        cloud.insert_cluster(
            REGION,
            ManagedCluster {
                name: "c1".into(),
                id: "cluster-1".into(),
                status: ClusterStatus::Active,
                version: Some("1.31".into()),
                endpoint: None,
                role_id: "role/kubeplane-cluster-role".into(),
                subnet_ids: vec!["subnet-a".into(), "subnet-b".into()],
                tags: config().ownership().cluster_tags(),
            },
        );
    }

    fn existing_pool(name: &str, scope: &str) -> NodePool {
        let mut tags = Ownership::new("kubeplane", scope).tags();
        tags.insert(NAME_KEY.into(), name.into());
        NodePool {
            name: name.into(),
            cluster: "c1".into(),
            status: NodePoolStatus::Active,
            role_id: "role/custom-node-role".into(),
            subnet_ids: vec!["subnet-x".into()],
            release_version: Some("1.31.2-20241109".into()),
            instance_types: vec!["m5.large".into()],
            capacity_type: CapacityType::OnDemand,
            disk_size_gb: 50,
            scaling: ScalingConfig {
                min_size: 1,
                max_size: 1,
                desired_size: 1,
            },
            labels: Tags::new(),
            health_issues: Vec::new(),
            tags,
        }
    }

    #[test]
    fn spot_uses_caller_list_and_ignores_size() {
        let mut spec = NodeSpec::sized("spot", "l+a100");
        spec.capacity_type = CapacityType::Spot;
        spec.spot_instance_types = vec!["m5.large".into(), "m5a.large".into()];

        let (capacity, types) = resolve_instance(Provider::Aws, &spec).unwrap();
        assert_eq!(capacity, CapacityType::Spot);
        assert_eq!(types, vec!["m5.large", "m5a.large"]);

        spec.spot_instance_types.clear();
        assert!(matches!(
            resolve_instance(Provider::Aws, &spec),
            Err(ControlError::Validation(_))
        ));
    }

    #[test]
    fn explicit_type_wins_over_size() {
        let mut spec = NodeSpec::sized("workers", "s");
        spec.instance_type = Some("c5.2xlarge".into());
        let (_, types) = resolve_instance(Provider::Aws, &spec).unwrap();
        assert_eq!(types, vec!["c5.2xlarge"]);
    }

    #[test]
    fn size_resolves_through_catalog() {
        let spec = NodeSpec::sized("gpu", "m+v100");
        let (capacity, types) = resolve_instance(Provider::Aws, &spec).unwrap();
        assert_eq!(capacity, CapacityType::OnDemand);
        assert_eq!(types, vec!["p3.2xlarge"]);

        let spec = NodeSpec::sized("gpu", "m+k80");
        assert!(matches!(
            resolve_instance(Provider::Gcp, &spec),
            Err(ControlError::Validation(_))
        ));

        let mut spec = NodeSpec::sized("none", "m");
        spec.machine_size = None;
        assert!(resolve_instance(Provider::Aws, &spec).is_err());
    }

    #[tokio::test]
    async fn first_pool_derives_from_cluster() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);

        let pool = manager()
            .add_node(&cloud, &session(), "c1", &NodeSpec::sized("default", "m+t4"))
            .await
            .unwrap();

        assert_eq!(pool.subnet_ids, vec!["subnet-a", "subnet-b"]);
        assert_eq!(pool.role_id, "role/kubeplane-node-role");
        assert_eq!(pool.instance_types, vec!["g4dn.xlarge"]);
        assert_eq!(pool.labels.get(GPU_LABEL).map(String::as_str), Some("true"));
        assert_eq!(cloud.calls("create_role"), 1);
        assert_eq!(cloud.calls("attach_role_policy"), 3);
        assert_eq!(cloud.calls("describe_node_pool"), 0);
    }

    #[tokio::test]
    async fn existing_node_role_gets_no_policy_calls() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);
        cloud.insert_role(Role {
            name: "kubeplane-node-role".into(),
            id: "role/kubeplane-node-role".into(),
            description: String::new(),
            attached_policies: Vec::new(),
            tags: Tags::new(),
        });

        manager()
            .add_node(&cloud, &session(), "c1", &NodeSpec::sized("default", "m"))
            .await
            .unwrap();

        assert_eq!(cloud.calls("create_role"), 0);
        assert_eq!(cloud.calls("attach_role_policy"), 0);
    }

    #[tokio::test]
    async fn later_pools_clone_the_first() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);
        cloud.insert_node_pool(REGION, existing_pool("default", "test"));

        let mut spec = NodeSpec::sized("big", "l");
        spec.disk_size_gb = 100;
        spec.count = 2;
        spec.max_count = Some(4);
        let pool = manager()
            .add_node(&cloud, &session(), "c1", &spec)
            .await
            .unwrap();

        assert_eq!(pool.role_id, "role/custom-node-role");
        assert_eq!(pool.subnet_ids, vec!["subnet-x"]);
        assert_eq!(pool.release_version.as_deref(), Some("1.31.2-20241109"));
        assert_eq!(pool.instance_types, vec!["m5.4xlarge"]);
        assert_eq!(pool.disk_size_gb, 100);
        assert_eq!(pool.scaling.max_size, 4);
        assert_eq!(cloud.calls("get_role"), 0);
        assert_eq!(cloud.calls("create_role"), 0);
    }

    #[test]
    fn request_tokens_follow_the_whole_request() {
        let manager = manager();
        let existing = existing_pool("default", "test");
        let session = session();

        let small = NodeSpec::sized("workers", "m");
        let large = NodeSpec::sized("workers", "l");
        let token = |session: &Session, spec: &NodeSpec| {
            manager
                .derive_from_default(session, &existing, "c1", spec)
                .unwrap()
                .request_token
        };

        // Retrying one request replays its token.
        assert_eq!(token(&session, &small), token(&session, &small));
        // Same name, different shape.
        assert_ne!(token(&session, &small), token(&session, &large));
        // Same body sent again as a new request.
        assert_ne!(token(&session, &small), token(&self::session(), &small));
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected_without_create() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);
        cloud.insert_node_pool(REGION, existing_pool("default", "test"));

        let err = manager()
            .add_node(&cloud, &session(), "c1", &NodeSpec::sized("default", "m"))
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::NodeGroupExists { .. }));
        assert_eq!(cloud.calls("create_node_pool"), 0);
    }

    #[tokio::test]
    async fn inactive_cluster_is_rejected() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);
        cloud.set_cluster_status(REGION, "c1", ClusterStatus::Creating);

        let err = manager()
            .add_node(&cloud, &session(), "c1", &NodeSpec::sized("default", "m"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControlError::ClusterNotActive {
                status: ClusterStatus::Creating,
                ..
            }
        ));
        assert_eq!(cloud.calls("list_node_pools"), 0);
    }

    #[tokio::test]
    async fn invalid_spec_makes_no_cloud_call() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);

        let err = manager()
            .add_node(&cloud, &session(), "c1", &NodeSpec::sized("Bad_Name", "m"))
            .await
            .unwrap_err();

        assert!(matches!(err, ControlError::Core(_)));
        assert_eq!(cloud.calls("describe_cluster"), 0);
    }

    #[tokio::test]
    async fn delete_enforces_scope() {
        let cloud = MockCloud::new(Provider::Aws);
        active_cluster(&cloud);
        cloud.insert_node_pool(REGION, existing_pool("ours", "test"));
        cloud.insert_node_pool(REGION, existing_pool("theirs", "staging"));

        let err = manager()
            .delete_node(&cloud, &session(), "c1", "theirs")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::ScopeMismatch { ref found, .. } if found.as_deref() == Some("staging")
        ));
        assert_eq!(cloud.calls("delete_node_pool"), 0);

        manager()
            .delete_node(&cloud, &session(), "c1", "ours")
            .await
            .unwrap();
        assert_eq!(cloud.calls("delete_node_pool"), 1);

        let err = manager()
            .delete_node(&cloud, &session(), "c1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::NodeGroupNotFound { .. }));
    }
}
