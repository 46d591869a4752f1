//! Kubeplane Gateway - HTTP API for the cluster control plane.
//!
//! This is the main entry point for the gateway service. It wires the
//! credential store, the per-provider cloud adapters and the node lister
//! into a [`ClusterService`] and serves it over HTTP.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` and set `DEV_MODE=true` to run every
//! provider against the in-memory cloud instead of the brokers.
//!
//! # Brokers
//!
//! Set `KUBEPLANE_<PROVIDER>_ENDPOINT` (for example `KUBEPLANE_AWS_ENDPOINT`)
//! for each provider to serve. Providers without an endpoint are not
//! registered and their requests fail with `not_found`.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubeplane_cloud::{CloudApi, CloudEndpoints};
use kubeplane_control::{
    ActivationPolicy, ClusterService, ControlConfig, ProviderRegistry, SessionResolver,
};
use kubeplane_gateway::{create_router, GatewayConfig, GatewayState};
use kubeplane_nodes::{ClusterApi, KubeClusterApi, NodesConfig};
use kubeplane_store::RocksSecretStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kubeplane=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kubeplane Gateway");

    // Load configuration from environment
    let gateway_config = GatewayConfig::from_env();
    let control_config = Arc::new(ControlConfig::from_env());

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = %gateway_config.data_dir,
        scope = %control_config.scope,
        deployment_mode = ?control_config.deployment_mode,
        "Gateway configuration loaded"
    );

    tracing::info!(path = %gateway_config.data_dir, "Opening credential store");
    let secrets = Arc::new(RocksSecretStore::open(&gateway_config.data_dir)?);
    let resolver = Arc::new(SessionResolver::new(Arc::clone(&control_config), secrets));

    let (apis, nodes) = cloud_backends()?;
    if apis.is_empty() {
        tracing::warn!("No provider endpoints configured - every request will fail");
    }

    let registry = ProviderRegistry::managed(apis, &nodes, &resolver, &control_config);
    tracing::info!(
        providers = ?registry.providers().collect::<Vec<_>>(),
        "Control plane initialized"
    );

    let service = Arc::new(ClusterService::new(
        registry,
        ActivationPolicy::from_secs(&control_config.activation_waits_seconds),
    ));

    let listen_addr = gateway_config.listen_addr.clone();
    let app = create_router(GatewayState::new(service, gateway_config));

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

type Backends = (Vec<Arc<dyn CloudApi>>, Arc<dyn ClusterApi>);

#[cfg(feature = "dev-mode")]
fn cloud_backends() -> Result<Backends, Box<dyn std::error::Error>> {
    if std::env::var("DEV_MODE").is_ok_and(|v| v == "true") {
        use kubeplane_cloud::MockCloud;
        use kubeplane_core::Provider;
        use kubeplane_nodes::MockClusterApi;

        tracing::warn!("DEV MODE ENABLED - using the in-memory cloud");
        let apis = Provider::ALL
            .into_iter()
            .map(|p| Arc::new(MockCloud::new(p)) as Arc<dyn CloudApi>)
            .collect();
        let nodes: Arc<dyn ClusterApi> = Arc::new(MockClusterApi::new());
        return Ok((apis, nodes));
    }
    broker_backends()
}

#[cfg(not(feature = "dev-mode"))]
fn cloud_backends() -> Result<Backends, Box<dyn std::error::Error>> {
    broker_backends()
}

fn broker_backends() -> Result<Backends, Box<dyn std::error::Error>> {
    let apis = CloudEndpoints::from_env().build()?;
    let nodes: Arc<dyn ClusterApi> = Arc::new(KubeClusterApi::new(NodesConfig::from_env()));
    Ok((apis, nodes))
}
