//! HTTP gateway for the kubeplane cluster control plane.
//!
//! This crate exposes [`ClusterService`](kubeplane_control::ClusterService)
//! as a JSON API under `/v1`. It handles:
//!
//! - REST endpoints for clusters, node pools, credentials and volumes
//! - Mapping control plane errors onto HTTP statuses
//! - Attaching a new cluster's default node pool in the background
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Clients                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HTTP
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     kubeplane-gateway                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │   Router    │ │  Handlers   │ │  Background default │    │
//! │  │ + middleware│ │             │ │  node pool tasks    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │   ClusterService    │
//!                   │  (kubeplane-control)│
//!                   └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kubeplane_control::{ClusterService, ProviderRegistry};
//! use kubeplane_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example(registry: ProviderRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(ClusterService::with_defaults(registry));
//! let state = GatewayState::new(service, GatewayConfig::default());
//!
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
