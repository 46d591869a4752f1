//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use kubeplane_control::ClusterService;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    /// The control plane entry point.
    pub service: Arc<ClusterService>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(service: Arc<ClusterService>, config: GatewayConfig) -> Self {
        Self { service, config }
    }
}
