//! Cluster and node pool endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use kubeplane_control::{
    ClusterDescription, ClusterSpec, ClusterStatusResponse, Location, NodeSpec,
};

use super::LocationQuery;
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Response for cluster list.
#[derive(Debug, Serialize)]
pub struct ListClustersResponse {
    /// Clusters of this deployment.
    pub clusters: Vec<ClusterDescription>,
}

/// Query parameters for cluster deletion.
#[derive(Debug, Deserialize)]
pub struct DeleteClusterQuery {
    /// Provider region.
    pub region: String,
    /// Provider account.
    pub account: String,
    /// Delete node pools first and wait for them.
    #[serde(default)]
    pub force: bool,
}

// =============================================================================
// Handlers
// =============================================================================

/// Create a cluster.
///
/// Returns as soon as the provider accepts the request. If the request carries
/// a default node pool, it is attached in the background once the cluster
/// becomes active.
///
/// # Errors
///
/// Returns an error if validation fails, the name is taken, or the provider
/// rejects the request.
pub async fn create_cluster(
    State(state): State<Arc<GatewayState>>,
    Json(spec): Json<ClusterSpec>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.create_cluster(&spec).await?;

    if spec.default_node.is_some() {
        let service = Arc::clone(&state.service);
        tokio::spawn(async move {
            if let Err(e) = service.attach_default_node(&spec).await {
                error!(cluster = %spec.name, error = %e, "Failed to attach default node pool");
            }
        });
        info!(cluster = %response.cluster_name, "Default node pool scheduled");
    }

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// List the clusters of this deployment in one location.
///
/// # Errors
///
/// Returns an error if the provider is unknown or the listing fails.
pub async fn list_clusters(
    State(state): State<Arc<GatewayState>>,
    Path(provider): Path<String>,
    Query(location): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let clusters = state
        .service
        .get_clusters(&provider, &location.into())
        .await?;
    Ok(Json(ListClustersResponse { clusters }))
}

/// Describe one cluster.
///
/// # Errors
///
/// Returns an error if the cluster is not found or the provider call fails.
pub async fn get_cluster(
    State(state): State<Arc<GatewayState>>,
    Path((provider, name)): Path<(String, String)>,
    Query(location): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cluster = state
        .service
        .get_cluster(&provider, &name, &location.into())
        .await?;
    Ok(Json(cluster))
}

/// Get a cluster's status.
///
/// # Errors
///
/// Returns an error if the cluster is not found or the provider call fails.
pub async fn cluster_status(
    State(state): State<Arc<GatewayState>>,
    Path((provider, name)): Path<(String, String)>,
    Query(location): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .service
        .cluster_status(&provider, &name, &location.into())
        .await?;
    Ok(Json(ClusterStatusResponse { status }))
}

/// Delete a cluster, optionally tearing down its node pools first.
///
/// # Errors
///
/// Returns an error if the cluster belongs to another deployment, the
/// provider refuses the deletion, or node pool teardown fails.
pub async fn delete_cluster(
    State(state): State<Arc<GatewayState>>,
    Path((provider, name)): Path<(String, String)>,
    Query(query): Query<DeleteClusterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let location = Location::new(query.region, query.account);
    state
        .service
        .delete_cluster(&provider, &name, &location, query.force)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach a node pool.
///
/// # Errors
///
/// Returns an error if the cluster is not active, the pool exists, or the
/// spec is invalid.
pub async fn add_node(
    State(state): State<Arc<GatewayState>>,
    Path((provider, cluster)): Path<(String, String)>,
    Query(location): Query<LocationQuery>,
    Json(spec): Json<NodeSpec>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .add_node(&provider, &cluster, &location.into(), &spec)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Delete a node pool.
///
/// # Errors
///
/// Returns an error if the pool is not found or belongs to another
/// deployment.
pub async fn delete_node(
    State(state): State<Arc<GatewayState>>,
    Path((provider, cluster, pool)): Path<(String, String, String)>,
    Query(location): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .delete_node(&provider, &cluster, &pool, &location.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
