//! Provider dispatch.
//!
//! [`ProviderRegistry`] maps each provider tag to one registered
//! [`ClusterController`]. [`ClusterService`] is the single entry point for
//! callers: every operation resolves a controller and delegates to it with
//! the request unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use kubeplane_cloud::{CloudApi, ClusterStatus, Snapshot, Volume};
use kubeplane_core::Provider;
use kubeplane_nodes::ClusterApi;
use kubeplane_store::Credential;
use tracing::{debug, info};

use crate::activation::ActivationPolicy;
use crate::cluster::{ClusterController, ManagedClusterController};
use crate::error::{ControlError, Result};
use crate::network::RegionGuard;
use crate::session::SessionResolver;
use crate::types::{
    ClusterDescription, ClusterSpec, ControlConfig, CostQuery, CostReport, CreateClusterResponse,
    CreateVolumeRequest, Location, NodeSpec,
};

/// Controllers by provider.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    controllers: BTreeMap<Provider, Arc<dyn ClusterController>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with a [`ManagedClusterController`] for each cloud.
    ///
    /// The controllers share one network guard.
    #[must_use]
    pub fn managed(
        apis: Vec<Arc<dyn CloudApi>>,
        nodes: &Arc<dyn ClusterApi>,
        resolver: &Arc<SessionResolver>,
        config: &Arc<ControlConfig>,
    ) -> Self {
        let guard = Arc::new(RegionGuard::new());
        apis.into_iter().fold(Self::new(), |registry, api| {
            registry.with(Arc::new(ManagedClusterController::new(
                api,
                Arc::clone(nodes),
                Arc::clone(resolver),
                Arc::clone(config),
                Arc::clone(&guard),
            )))
        })
    }

    /// Register a controller, replacing any previous one for its provider.
    pub fn register(&mut self, controller: Arc<dyn ClusterController>) {
        let provider = controller.provider();
        if self.controllers.insert(provider, controller).is_some() {
            debug!(%provider, "Replaced cluster controller");
        }
    }

    /// Register a controller, builder style.
    #[must_use]
    pub fn with(mut self, controller: Arc<dyn ClusterController>) -> Self {
        self.register(controller);
        self
    }

    /// Find the controller for a provider tag.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ProviderNotFound` if the tag is unknown or no
    /// controller is registered for it.
    pub fn resolve(&self, provider: &str) -> Result<Arc<dyn ClusterController>> {
        provider
            .parse::<Provider>()
            .ok()
            .and_then(|p| self.controllers.get(&p).cloned())
            .ok_or_else(|| ControlError::ProviderNotFound(provider.to_string()))
    }

    /// Providers with a registered controller.
    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.controllers.keys().copied()
    }
}

/// The control plane's entry point.
#[derive(Clone)]
pub struct ClusterService {
    registry: ProviderRegistry,
    activation: ActivationPolicy,
}

impl ClusterService {
    /// Create a new service.
    #[must_use]
    pub fn new(registry: ProviderRegistry, activation: ActivationPolicy) -> Self {
        Self {
            registry,
            activation,
        }
    }

    /// Create a new service with the default activation schedule.
    #[must_use]
    pub fn with_defaults(registry: ProviderRegistry) -> Self {
        Self::new(registry, ActivationPolicy::default())
    }

    /// Get a reference to the registry.
    #[must_use]
    pub const fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Get a reference to the activation policy.
    #[must_use]
    pub const fn activation(&self) -> &ActivationPolicy {
        &self.activation
    }

    // ========================================================================
    // Clusters
    // ========================================================================

    /// Create a cluster.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::create_cluster`].
    pub async fn create_cluster(&self, spec: &ClusterSpec) -> Result<CreateClusterResponse> {
        self.registry
            .resolve(&spec.provider)?
            .create_cluster(spec)
            .await
    }

    /// Wait for a new cluster to become active, then attach its default node
    /// pool. Does nothing when no default pool is requested.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ActivationFailed` or any `add_node` error.
    pub async fn attach_default_node(&self, spec: &ClusterSpec) -> Result<()> {
        let Some(node) = &spec.default_node else {
            return Ok(());
        };
        let controller = self.registry.resolve(&spec.provider)?;
        let location = spec.location();

        self.activation
            .wait_until_active(&spec.name, || {
                controller.cluster_status(&spec.name, &location)
            })
            .await?;
        controller.add_node(&spec.name, &location, node).await?;

        info!(cluster = %spec.name, pool = %node.name, "Attached default node pool");
        Ok(())
    }

    /// Describe one cluster.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::get_cluster`].
    pub async fn get_cluster(
        &self,
        provider: &str,
        name: &str,
        location: &Location,
    ) -> Result<ClusterDescription> {
        self.registry
            .resolve(provider)?
            .get_cluster(name, location)
            .await
    }

    /// Describe every cluster of this deployment in a location.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::get_clusters`].
    pub async fn get_clusters(
        &self,
        provider: &str,
        location: &Location,
    ) -> Result<Vec<ClusterDescription>> {
        self.registry.resolve(provider)?.get_clusters(location).await
    }

    /// Get a cluster's status.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::cluster_status`].
    pub async fn cluster_status(
        &self,
        provider: &str,
        name: &str,
        location: &Location,
    ) -> Result<ClusterStatus> {
        self.registry
            .resolve(provider)?
            .cluster_status(name, location)
            .await
    }

    /// Delete a cluster.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::delete_cluster`].
    pub async fn delete_cluster(
        &self,
        provider: &str,
        name: &str,
        location: &Location,
        force: bool,
    ) -> Result<()> {
        self.registry
            .resolve(provider)?
            .delete_cluster(name, location, force)
            .await
    }

    // ========================================================================
    // Node pools
    // ========================================================================

    /// Attach a node pool.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::add_node`].
    pub async fn add_node(
        &self,
        provider: &str,
        cluster: &str,
        location: &Location,
        spec: &NodeSpec,
    ) -> Result<()> {
        self.registry
            .resolve(provider)?
            .add_node(cluster, location, spec)
            .await
    }

    /// Delete a node pool.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::delete_node`].
    pub async fn delete_node(
        &self,
        provider: &str,
        cluster: &str,
        pool: &str,
        location: &Location,
    ) -> Result<()> {
        self.registry
            .resolve(provider)?
            .delete_node(cluster, pool, location)
            .await
    }

    // ========================================================================
    // Volumes
    // ========================================================================

    /// Create a volume.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::create_volume`].
    pub async fn create_volume(
        &self,
        provider: &str,
        location: &Location,
        request: &CreateVolumeRequest,
    ) -> Result<Volume> {
        self.registry
            .resolve(provider)?
            .create_volume(location, request)
            .await
    }

    /// Delete a volume.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::delete_volume`].
    pub async fn delete_volume(
        &self,
        provider: &str,
        location: &Location,
        volume_id: &str,
    ) -> Result<()> {
        self.registry
            .resolve(provider)?
            .delete_volume(location, volume_id)
            .await
    }

    /// Snapshot a volume.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::create_snapshot`].
    pub async fn create_snapshot(
        &self,
        provider: &str,
        location: &Location,
        volume_id: &str,
    ) -> Result<Snapshot> {
        self.registry
            .resolve(provider)?
            .create_snapshot(location, volume_id)
            .await
    }

    /// Snapshot a volume and delete it once the snapshot completes.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::create_snapshot_and_delete`].
    pub async fn create_snapshot_and_delete(
        &self,
        provider: &str,
        location: &Location,
        volume_id: &str,
    ) -> Result<Snapshot> {
        self.registry
            .resolve(provider)?
            .create_snapshot_and_delete(location, volume_id)
            .await
    }

    // ========================================================================
    // Pass-throughs
    // ========================================================================

    /// Report costs.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::get_cost`].
    pub async fn get_cost(
        &self,
        provider: &str,
        location: &Location,
        query: &CostQuery,
    ) -> Result<CostReport> {
        self.registry
            .resolve(provider)?
            .get_cost(location, query)
            .await
    }

    /// Store a credential.
    ///
    /// # Errors
    ///
    /// See [`ClusterController::add_credential`].
    pub async fn add_credential(
        &self,
        provider: &str,
        account: &str,
        credential: &Credential,
    ) -> Result<()> {
        self.registry
            .resolve(provider)?
            .add_credential(account, credential)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kubeplane_cloud::MockCloud;
    use kubeplane_nodes::MockClusterApi;
    use kubeplane_store::MemorySecretStore;

    /// A controller that only knows its provider.
    struct Bare(Provider);

    #[async_trait]
    impl ClusterController for Bare {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn create_cluster(&self, spec: &ClusterSpec) -> Result<CreateClusterResponse> {
            Ok(CreateClusterResponse {
                cluster_name: spec.name.clone(),
                status: ClusterStatus::Creating,
            })
        }

        async fn get_cluster(&self, name: &str, _: &Location) -> Result<ClusterDescription> {
            Err(ControlError::ClusterNotFound(name.to_string()))
        }

        async fn get_clusters(&self, _: &Location) -> Result<Vec<ClusterDescription>> {
            Ok(Vec::new())
        }

        async fn cluster_status(&self, _: &str, _: &Location) -> Result<ClusterStatus> {
            Ok(ClusterStatus::Active)
        }

        async fn delete_cluster(&self, _: &str, _: &Location, _: bool) -> Result<()> {
            Ok(())
        }

        async fn add_node(&self, _: &str, _: &Location, _: &NodeSpec) -> Result<()> {
            Ok(())
        }

        async fn delete_node(&self, _: &str, _: &str, _: &Location) -> Result<()> {
            Ok(())
        }
    }

    fn location() -> Location {
        Location::new("eastus", "sub-1")
    }

    #[tokio::test]
    async fn unknown_and_unregistered_tags_are_provider_not_found() {
        let service = ClusterService::with_defaults(
            ProviderRegistry::new().with(Arc::new(Bare(Provider::Azure))),
        );

        for tag in ["digitalocean", "gcp"] {
            let err = service.get_clusters(tag, &location()).await.unwrap_err();
            assert!(matches!(err, ControlError::ProviderNotFound(ref t) if t == tag));
        }
        assert!(service.get_clusters("aks", &location()).await.is_ok());
    }

    #[tokio::test]
    async fn defaults_are_not_implemented() {
        let service = ClusterService::with_defaults(
            ProviderRegistry::new().with(Arc::new(Bare(Provider::Azure))),
        );

        let err = service
            .create_snapshot("azure", &location(), "vol-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::NotImplemented {
                operation: "create_snapshot",
                ..
            }
        ));

        let err = service
            .add_credential("azure", "sub-1", &Credential::new("id", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::NotImplemented { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn default_node_is_attached_after_activation() {
        let service = ClusterService::new(
            ProviderRegistry::new().with(Arc::new(Bare(Provider::Azure))),
            ActivationPolicy::from_secs(&[1]),
        );
        let mut spec = ClusterSpec {
            name: "c1".into(),
            provider: "azure".into(),
            region: "eastus".into(),
            account: "sub-1".into(),
            default_node: None,
            labels: Default::default(),
        };
        service.attach_default_node(&spec).await.unwrap();

        spec.default_node = Some(NodeSpec::sized("default", "m"));
        service.attach_default_node(&spec).await.unwrap();
    }

    #[tokio::test]
    async fn managed_registry_covers_each_cloud() {
        let config = Arc::new(ControlConfig::default());
        let resolver = Arc::new(SessionResolver::new(
            Arc::clone(&config),
            Arc::new(MemorySecretStore::new()),
        ));
        let nodes: Arc<dyn ClusterApi> = Arc::new(MockClusterApi::new());
        let apis: Vec<Arc<dyn CloudApi>> = vec![
            Arc::new(MockCloud::new(Provider::Aws)),
            Arc::new(MockCloud::new(Provider::Gcp)),
        ];

        let registry = ProviderRegistry::managed(apis, &nodes, &resolver, &config);
        assert_eq!(
            registry.providers().collect::<Vec<_>>(),
            vec![Provider::Aws, Provider::Gcp]
        );

        let service = ClusterService::with_defaults(registry);
        service
            .add_credential("gke", "proj-1", &Credential::new("id", "secret"))
            .await
            .unwrap();
        let err = service
            .get_clusters("gcp", &Location::new("us-central1", "proj-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::CredentialNotFound { .. }));
        assert!(service
            .get_clusters("gcp", &Location::new("us-central1", "proj-1"))
            .await
            .unwrap()
            .is_empty());
    }
}
