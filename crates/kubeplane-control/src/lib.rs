//! Control plane for kubeplane-managed Kubernetes clusters.
//!
//! This crate holds the orchestration logic: it turns a cluster request into
//! the ordered sequence of cloud calls that builds a tagged network, the IAM
//! roles, the managed cluster and its node pools, and tears them down again.
//! One [`ClusterController`] exists per cloud provider; [`ClusterService`]
//! routes each request to the right one by provider tag.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gateway (HTTP)                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               ClusterService / ProviderRegistry             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  provider tag
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │   aws    │   │  azure   │   │   gcp    │
//!        │controller│   │controller│   │controller│
//!        └──────────┘   └──────────┘   └──────────┘
//!               │              │              │
//!   ┌───────────┼──────────────┼──────────────┼───────────┐
//!   ▼           ▼              ▼              ▼           ▼
//! ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌─────────┐
//! │ Network │ │Identity │ │ NodePool │ │ Teardown │ │ Session │
//! │  stack  │ │  roles  │ │ manager  │ │  waiter  │ │resolver │
//! └─────────┘ └─────────┘ └──────────┘ └──────────┘ └─────────┘
//!        │                                                │
//!        ▼                                                ▼
//!  kubeplane-cloud (provider APIs)          kubeplane-store (credentials)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use kubeplane_cloud::{CloudApi, CloudEndpoints};
//! use kubeplane_control::{
//!     ClusterService, ClusterSpec, ControlConfig, NodeSpec, ProviderRegistry, SessionResolver,
//! };
//! use kubeplane_nodes::{ClusterApi, KubeClusterApi, NodesConfig};
//! use kubeplane_store::RocksSecretStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ControlConfig::from_env());
//! let secrets = Arc::new(RocksSecretStore::open("/tmp/kubeplane")?);
//! let resolver = Arc::new(SessionResolver::new(Arc::clone(&config), secrets));
//! let nodes: Arc<dyn ClusterApi> = Arc::new(KubeClusterApi::new(NodesConfig::default()));
//! let apis: Vec<Arc<dyn CloudApi>> = CloudEndpoints::from_env().build()?;
//!
//! let service = ClusterService::with_defaults(ProviderRegistry::managed(
//!     apis, &nodes, &resolver, &config,
//! ));
//!
//! let spec = ClusterSpec {
//!     name: "analytics".to_string(),
//!     provider: "aws".to_string(),
//!     region: "us-east-1".to_string(),
//!     account: "123456789012".to_string(),
//!     default_node: Some(NodeSpec::sized("default", "m")),
//!     labels: Default::default(),
//! };
//! let response = service.create_cluster(&spec).await?;
//! println!("{} is {}", response.cluster_name, response.status);
//!
//! // Blocks for minutes while the cluster activates.
//! service.attach_default_node(&spec).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Ownership
//!
//! Every resource this crate creates carries the owner, scope and
//! provisioner tags from [`ControlConfig::ownership`]. Reads filter on them,
//! and destructive operations refuse resources from another scope.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod activation;
pub mod catalog;
pub mod cluster;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod network;
pub mod nodepool;
pub mod profile;
pub mod session;
pub mod teardown;
pub mod types;

pub use activation::ActivationPolicy;
pub use cluster::{ClusterController, ManagedClusterController};
pub use dispatch::{ClusterService, ProviderRegistry};
pub use error::{ControlError, Result};
pub use network::{NetworkProvisioner, NetworkStack, RegionGuard};
pub use nodepool::NodePoolManager;
pub use profile::ProviderProfile;
pub use session::SessionResolver;
pub use teardown::{TeardownFailure, TeardownReport};
pub use types::{
    ClusterDescription, ClusterSpec, ClusterStatusResponse, ControlConfig, CostQuery, CostReport,
    CreateClusterResponse, CreateVolumeRequest, DeploymentMode, LocalCredential, Location,
    NodePoolDescription, NodeSpec,
};

// Re-export commonly used types from dependencies for convenience
pub use kubeplane_cloud::{ClusterStatus, NodePoolStatus, Snapshot, Volume};
pub use kubeplane_core::Provider;
