//! Cloud resource provider API for kubeplane.
//!
//! This crate defines what the control plane needs from a cloud: networks,
//! identity roles, managed clusters, node pools and (optionally) block
//! storage. Every call takes a [`Session`] bound to one provider, region and
//! account.
//!
//! - [`HttpCloudApi`] talks to a per-provider broker over HTTP
//! - [`MockCloud`] (feature `test-utils`) keeps everything in memory
//!
//! Lookups report missing resources as [`CloudError::NotFound`] so callers
//! can tell "create it" apart from "something is broken".
//!
//! # Example
//!
//! ```no_run
//! use chrono::Duration;
//! use kubeplane_cloud::{ContainerApi, HttpCloudApi, Session};
//! use kubeplane_core::Provider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpCloudApi::new(Provider::Aws, "http://aws-broker:8080")?;
//! let session = Session::new(
//!     Provider::Aws,
//!     "us-east-1",
//!     "123456789012",
//!     "AKIA...",
//!     "secret",
//!     Duration::minutes(15),
//! );
//! for name in api.list_clusters(&session).await? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod session;
pub mod types;
pub mod wait;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use api::{CloudApi, ContainerApi, IdentityApi, NetworkApi, VolumeApi};
pub use endpoints::CloudEndpoints;
pub use error::{CloudError, Result};
pub use http::HttpCloudApi;
pub use session::Session;
pub use types::{
    CapacityType, ClusterStatus, CreateClusterInput, CreateNodePoolInput, CreateRoleInput,
    CreateVolumeInput, Gateway, ManagedCluster, Network, NetworkState, NodePool, NodePoolStatus,
    ResourceFilter, Role, Route, RouteTable, RouteTableAssociation, ScalingConfig, Snapshot,
    SnapshotState, Subnet, Volume, VolumeState,
};
pub use wait::PollOptions;

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockCloud;
