//! Cluster lifecycle.
//!
//! [`ClusterController`] is the capability interface the dispatcher routes
//! to. Operations a provider can't serve keep the default implementation,
//! which returns `ControlError::NotImplemented`.
//!
//! [`ManagedClusterController`] implements it for any [`CloudApi`]; the
//! per-provider differences live in its [`ProviderProfile`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kubeplane_cloud::wait::wait_snapshot_completed;
use kubeplane_cloud::{
    CloudApi, ClusterStatus, CreateClusterInput, CreateVolumeInput, ManagedCluster, PollOptions,
    Session, Snapshot, Volume, VolumeApi,
};
use kubeplane_core::tags::{NAME_KEY, SCOPE_KEY};
use kubeplane_core::{validate_name, Ownership, Provider, RequestToken};
use kubeplane_nodes::{ClusterApi, NodeInfo};
use kubeplane_store::Credential;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::identity::{attach_policies, ensure_role};
use crate::network::{NetworkProvisioner, RegionGuard};
use crate::nodepool::{cluster_error, NodePoolManager};
use crate::profile::ProviderProfile;
use crate::session::{request_token, SessionResolver};
use crate::teardown::wait_for_all_deletions;
use crate::types::{
    ClusterDescription, ClusterSpec, ControlConfig, CostQuery, CostReport, CreateClusterResponse,
    CreateVolumeRequest, Location, NodePoolDescription, NodeSpec,
};

const SNAPSHOT_WAIT_TIMEOUT: Duration = Duration::from_secs(1800);

fn not_implemented(provider: Provider, operation: &'static str) -> ControlError {
    ControlError::NotImplemented {
        provider,
        operation,
    }
}

/// Cluster operations for one provider.
#[async_trait]
pub trait ClusterController: Send + Sync {
    /// The provider this controller serves.
    fn provider(&self) -> Provider;

    // ========================================================================
    // Clusters
    // ========================================================================

    /// Create a cluster and return as soon as the provider accepts it.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ClusterExists` if the name is taken.
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<CreateClusterResponse>;

    /// Describe one cluster with its node pools and, when active, its nodes.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ClusterNotFound` if the cluster doesn't exist
    /// or wasn't created by this deployment.
    async fn get_cluster(&self, name: &str, location: &Location) -> Result<ClusterDescription>;

    /// Describe every cluster this deployment created in a location.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    async fn get_clusters(&self, location: &Location) -> Result<Vec<ClusterDescription>>;

    /// Get a cluster's provider status.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ClusterNotFound` if the cluster doesn't exist.
    async fn cluster_status(&self, name: &str, location: &Location) -> Result<ClusterStatus>;

    /// Delete a cluster, first tearing down its node pools when `force` is set.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ScopeMismatch` for clusters of another scope,
    /// teardown errors, or the provider's rejection verbatim.
    async fn delete_cluster(&self, name: &str, location: &Location, force: bool) -> Result<()>;

    // ========================================================================
    // Node pools
    // ========================================================================

    /// Attach a node pool to an active cluster.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeGroupExists` or
    /// `ControlError::ClusterNotActive`.
    async fn add_node(&self, cluster: &str, location: &Location, spec: &NodeSpec) -> Result<()>;

    /// Delete a node pool in this deployment's scope.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ScopeMismatch` for pools of another scope.
    async fn delete_node(&self, cluster: &str, pool: &str, location: &Location) -> Result<()>;

    // ========================================================================
    // Volumes
    // ========================================================================

    /// Create a block storage volume.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn create_volume(
        &self,
        _location: &Location,
        _request: &CreateVolumeRequest,
    ) -> Result<Volume> {
        Err(not_implemented(self.provider(), "create_volume"))
    }

    /// Delete a block storage volume.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn delete_volume(&self, _location: &Location, _volume_id: &str) -> Result<()> {
        Err(not_implemented(self.provider(), "delete_volume"))
    }

    /// Snapshot a volume.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn create_snapshot(&self, _location: &Location, _volume_id: &str) -> Result<Snapshot> {
        Err(not_implemented(self.provider(), "create_snapshot"))
    }

    /// Snapshot a volume, wait for the snapshot, then delete the volume.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn create_snapshot_and_delete(
        &self,
        _location: &Location,
        _volume_id: &str,
    ) -> Result<Snapshot> {
        Err(not_implemented(self.provider(), "create_snapshot_and_delete"))
    }

    // ========================================================================
    // Pass-throughs
    // ========================================================================

    /// Report costs for a period.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn get_cost(&self, _location: &Location, _query: &CostQuery) -> Result<CostReport> {
        Err(not_implemented(self.provider(), "get_cost"))
    }

    /// Store a credential for an account.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NotImplemented` unless the provider supports it.
    async fn add_credential(&self, _account: &str, _credential: &Credential) -> Result<()> {
        Err(not_implemented(self.provider(), "add_credential"))
    }
}

/// A [`ClusterController`] for any provider reachable through [`CloudApi`].
pub struct ManagedClusterController {
    api: Arc<dyn CloudApi>,
    nodes: Arc<dyn ClusterApi>,
    resolver: Arc<SessionResolver>,
    config: Arc<ControlConfig>,
    profile: ProviderProfile,
    ownership: Ownership,
    network: NetworkProvisioner,
    pools: NodePoolManager,
}

impl ManagedClusterController {
    /// Create a controller for the provider behind `api`.
    ///
    /// Controllers that share `guard` serialize network creation per region.
    #[must_use]
    pub fn new(
        api: Arc<dyn CloudApi>,
        nodes: Arc<dyn ClusterApi>,
        resolver: Arc<SessionResolver>,
        config: Arc<ControlConfig>,
        guard: Arc<RegionGuard>,
    ) -> Self {
        let profile = ProviderProfile::for_provider(api.provider());
        Self {
            network: NetworkProvisioner::new(&config, guard),
            pools: NodePoolManager::new(&config, profile),
            ownership: config.ownership(),
            api,
            nodes,
            resolver,
            config,
            profile,
        }
    }

    /// Get a reference to the config.
    #[must_use]
    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    fn session(&self, location: &Location) -> Result<Session> {
        self.resolver.resolve(self.profile.provider, location)
    }

    fn volume_api(&self, operation: &'static str) -> Result<&dyn VolumeApi> {
        self.api
            .volumes()
            .ok_or_else(|| not_implemented(self.profile.provider, operation))
    }

    async fn list_nodes(&self, session: &Session, cluster: &str) -> Result<Vec<NodeInfo>> {
        let kubeconfig = self.api.cluster_kubeconfig(session, cluster).await?;
        Ok(self.nodes.list_nodes(&kubeconfig).await?)
    }

    /// Describe a cluster's in-scope node pools, skipping foreign ones.
    async fn node_pools(
        &self,
        session: &Session,
        cluster: &str,
    ) -> Result<Vec<NodePoolDescription>> {
        let mut pools = Vec::new();
        for name in self.api.list_node_pools(session, cluster).await? {
            let pool = match self.api.describe_node_pool(session, cluster, &name).await {
                Ok(pool) => pool,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            if !self.ownership.in_scope(&pool.tags) {
                debug!(cluster, pool = %name, "Skipping node pool of another scope");
                continue;
            }
            pools.push(pool.into());
        }
        Ok(pools)
    }

    fn description(
        &self,
        session: &Session,
        cluster: ManagedCluster,
        node_pools: Vec<NodePoolDescription>,
        nodes: Vec<NodeInfo>,
    ) -> ClusterDescription {
        ClusterDescription {
            name: cluster.name,
            provider: self.profile.provider,
            region: session.region().to_string(),
            id: cluster.id,
            status: cluster.status,
            version: cluster.version,
            endpoint: cluster.endpoint,
            node_pools,
            nodes,
            tags: cluster.tags,
        }
    }
}

#[async_trait]
impl ClusterController for ManagedClusterController {
    fn provider(&self) -> Provider {
        self.profile.provider
    }

    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<CreateClusterResponse> {
        validate_name("cluster", &spec.name)?;
        if let Some(node) = &spec.default_node {
            self.pools.validate(node)?;
        }

        let location = spec.location();
        let session = self.session(&location)?;

        match self.api.describe_cluster(&session, &spec.name).await {
            Ok(_) => return Err(ControlError::ClusterExists(spec.name.clone())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let stack = self
            .network
            .discover_or_create(self.api.as_ref(), &session)
            .await?;

        let (role, created) = ensure_role(
            self.api.as_ref(),
            &session,
            &self.ownership,
            &self.config.cluster_role_name,
            "Control planes of kubeplane-managed clusters",
            self.profile.cluster_trust_policy(),
        )
        .await?;
        if created {
            attach_policies(
                self.api.as_ref(),
                &session,
                &role.name,
                self.profile.cluster_policies,
            )
            .await?;
        }

        let mut tags = spec.labels.clone();
        tags.extend(self.ownership.cluster_tags());
        tags.insert(NAME_KEY.to_string(), spec.name.clone());

        let mut input = CreateClusterInput {
            name: spec.name.clone(),
            role_id: role.id,
            subnet_ids: stack.subnet_ids,
            tags,
            request_token: RequestToken::derive(&[]),
        };
        input.request_token = request_token("create-cluster", &session, &input)?;
        let cluster = self.api.create_cluster(&session, &input).await?;
        info!(
            cluster = %cluster.name,
            provider = %self.profile.provider,
            region = %location.region,
            network_id = %stack.network_id,
            status = %cluster.status,
            "Created cluster"
        );

        Ok(CreateClusterResponse {
            cluster_name: cluster.name,
            status: cluster.status,
        })
    }

    async fn get_cluster(&self, name: &str, location: &Location) -> Result<ClusterDescription> {
        let session = self.session(location)?;
        let cluster = self
            .api
            .describe_cluster(&session, name)
            .await
            .map_err(|e| cluster_error(e, name))?;
        if !self.ownership.created_cluster(&cluster.tags) {
            return Err(ControlError::ClusterNotFound(name.to_string()));
        }

        let node_pools = self.node_pools(&session, name).await?;
        let nodes = if cluster.status == ClusterStatus::Active {
            self.list_nodes(&session, name).await.unwrap_or_else(|e| {
                warn!(cluster = name, error = %e, "Could not list cluster nodes");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        Ok(self.description(&session, cluster, node_pools, nodes))
    }

    async fn get_clusters(&self, location: &Location) -> Result<Vec<ClusterDescription>> {
        let session = self.session(location)?;
        let mut clusters = Vec::new();

        for name in self.api.list_clusters(&session).await? {
            let cluster = match self.api.describe_cluster(&session, &name).await {
                Ok(cluster) => cluster,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            if !self.ownership.created_cluster(&cluster.tags) {
                debug!(cluster = %name, "Skipping cluster not created by this deployment");
                continue;
            }

            let node_pools = self.node_pools(&session, &name).await?;
            let nodes = if cluster.status == ClusterStatus::Active {
                self.list_nodes(&session, &name).await.unwrap_or_else(|e| {
                    warn!(cluster = %name, error = %e, "Could not list cluster nodes");
                    Vec::new()
                })
            } else {
                Vec::new()
            };
            clusters.push(self.description(&session, cluster, node_pools, nodes));
        }

        Ok(clusters)
    }

    async fn cluster_status(&self, name: &str, location: &Location) -> Result<ClusterStatus> {
        let session = self.session(location)?;
        let cluster = self
            .api
            .describe_cluster(&session, name)
            .await
            .map_err(|e| cluster_error(e, name))?;
        Ok(cluster.status)
    }

    async fn delete_cluster(&self, name: &str, location: &Location, force: bool) -> Result<()> {
        let session = self.session(location)?;
        let cluster = self
            .api
            .describe_cluster(&session, name)
            .await
            .map_err(|e| cluster_error(e, name))?;
        if !self.ownership.in_scope(&cluster.tags) {
            return Err(ControlError::ScopeMismatch {
                kind: "cluster",
                name: name.to_string(),
                expected: self.ownership.scope().to_string(),
                found: cluster.tags.get(SCOPE_KEY).cloned(),
            });
        }

        let session = if force {
            let pools = self.api.list_node_pools(&session, name).await?;
            for pool in &pools {
                match self.api.delete_node_pool(&session, name, pool).await {
                    Ok(()) => {
                        info!(cluster = name, pool = %pool, "Requested node pool deletion");
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(cluster = name, pool = %pool, "Node pool already gone");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if !pools.is_empty() {
                wait_for_all_deletions(
                    Arc::clone(&self.api),
                    &session,
                    name,
                    &pools,
                    self.config.nodepool_delete_timeout(),
                    self.config.poll_interval(),
                )
                .await?;
            }
            self.resolver.refresh(session)?
        } else {
            session
        };

        self.api.delete_cluster(&session, name).await?;
        info!(cluster = name, force, "Requested cluster deletion");
        Ok(())
    }

    async fn add_node(&self, cluster: &str, location: &Location, spec: &NodeSpec) -> Result<()> {
        self.pools.validate(spec)?;
        let session = self.session(location)?;
        self.pools
            .add_node(self.api.as_ref(), &session, cluster, spec)
            .await?;
        Ok(())
    }

    async fn delete_node(&self, cluster: &str, pool: &str, location: &Location) -> Result<()> {
        let session = self.session(location)?;
        self.pools
            .delete_node(self.api.as_ref(), &session, cluster, pool)
            .await
    }

    async fn create_volume(
        &self,
        location: &Location,
        request: &CreateVolumeRequest,
    ) -> Result<Volume> {
        let volumes = self.volume_api("create_volume")?;
        if request.size_gb == 0 {
            return Err(ControlError::Validation(
                "volume size must be at least 1 GiB".to_string(),
            ));
        }
        let session = self.session(location)?;

        let input = CreateVolumeInput {
            zone: request.zone.clone(),
            size_gb: request.size_gb,
            volume_type: request.volume_type.clone(),
            tags: self.ownership.tags(),
        };
        let volume = volumes.create_volume(&session, &input).await?;
        info!(
            volume_id = %volume.id,
            zone = %volume.zone,
            size_gb = volume.size_gb,
            "Created volume"
        );
        Ok(volume)
    }

    async fn delete_volume(&self, location: &Location, volume_id: &str) -> Result<()> {
        let volumes = self.volume_api("delete_volume")?;
        let session = self.session(location)?;
        volumes.delete_volume(&session, volume_id).await?;
        info!(volume_id, "Deleted volume");
        Ok(())
    }

    async fn create_snapshot(&self, location: &Location, volume_id: &str) -> Result<Snapshot> {
        let volumes = self.volume_api("create_snapshot")?;
        let session = self.session(location)?;
        let snapshot = volumes
            .create_snapshot(&session, volume_id, &self.ownership.tags())
            .await?;
        info!(volume_id, snapshot_id = %snapshot.id, "Created snapshot");
        Ok(snapshot)
    }

    async fn create_snapshot_and_delete(
        &self,
        location: &Location,
        volume_id: &str,
    ) -> Result<Snapshot> {
        let volumes = self.volume_api("create_snapshot_and_delete")?;
        let session = self.session(location)?;

        let snapshot = volumes
            .create_snapshot(&session, volume_id, &self.ownership.tags())
            .await?;
        info!(volume_id, snapshot_id = %snapshot.id, "Created snapshot");

        let options = PollOptions::new(self.config.poll_interval(), SNAPSHOT_WAIT_TIMEOUT);
        let snapshot = wait_snapshot_completed(volumes, &session, &snapshot.id, options).await?;

        // The snapshot wait can outlive the first session.
        let session = self.session(location)?;
        volumes.delete_volume(&session, volume_id).await?;
        info!(volume_id, snapshot_id = %snapshot.id, "Deleted snapshotted volume");
        Ok(snapshot)
    }

    async fn add_credential(&self, account: &str, credential: &Credential) -> Result<()> {
        self.resolver
            .add_credential(self.profile.provider, account, credential)
    }
}
