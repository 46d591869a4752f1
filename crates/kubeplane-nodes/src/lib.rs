//! Kubernetes node listing for kubeplane-managed clusters.
//!
//! Once a managed cluster is active, its API server is the source of truth
//! for which nodes actually joined. This crate provides the [`ClusterApi`]
//! trait and the [`KubeClusterApi`] implementation, which connects from a
//! kubeconfig document handed out by the cloud provider and reports each
//! node's readiness, pool and addresses.
//!
//! # Example
//!
//! ```no_run
//! use kubeplane_nodes::{ClusterApi, KubeClusterApi, NodesConfig};
//!
//! # async fn example(kubeconfig: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let api = KubeClusterApi::new(NodesConfig::default());
//! for node in api.list_nodes(kubeconfig).await? {
//!     println!("{} ready={} ip={:?}", node.name, node.ready, node.internal_ip);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Testing
//!
//! For testing without a real cluster, enable the `test-utils` feature and
//! use the mock:
//!
//! ```ignore
//! use kubeplane_nodes::{ClusterApi, MockClusterApi};
//!
//! let api = MockClusterApi::new();
//! api.set_nodes("kubeconfig", vec![]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod k8s;
pub mod types;

pub use error::{NodesError, Result};
pub use k8s::{ClusterApi, KubeClusterApi};
pub use types::{NodeInfo, NodesConfig};

#[cfg(any(test, feature = "test-utils"))]
pub use k8s::mock::MockClusterApi;
