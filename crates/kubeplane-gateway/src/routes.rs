//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{clusters, credentials, health, volumes};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// Location-scoped endpoints take `region` and `account` query parameters.
///
/// # Routes
///
/// - `GET /health` - Health check
///
/// ## Clusters
/// - `POST /v1/clusters` - Create cluster
/// - `GET /v1/clusters/:provider` - List clusters
/// - `GET /v1/clusters/:provider/:name` - Describe cluster
/// - `DELETE /v1/clusters/:provider/:name` - Delete cluster (`?force=true`)
/// - `GET /v1/clusters/:provider/:name/status` - Cluster status
/// - `POST /v1/clusters/:provider/:name/nodepools` - Add node pool
/// - `DELETE /v1/clusters/:provider/:name/nodepools/:pool` - Delete node pool
///
/// ## Credentials
/// - `PUT /v1/credentials/:provider/:account` - Store credential
///
/// ## Volumes
/// - `POST /v1/volumes/:provider` - Create volume
/// - `DELETE /v1/volumes/:provider/:volume_id` - Delete volume
/// - `POST /v1/volumes/:provider/:volume_id/snapshots` - Snapshot
///   (`?delete_volume=true`)
///
/// ## Costs
/// - `GET /v1/costs/:provider` - Cost report
pub fn create_router(state: GatewayState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        // Clusters
        .route("/v1/clusters", post(clusters::create_cluster))
        .route("/v1/clusters/:provider", get(clusters::list_clusters))
        .route(
            "/v1/clusters/:provider/:name",
            get(clusters::get_cluster).delete(clusters::delete_cluster),
        )
        .route(
            "/v1/clusters/:provider/:name/status",
            get(clusters::cluster_status),
        )
        .route(
            "/v1/clusters/:provider/:name/nodepools",
            post(clusters::add_node),
        )
        .route(
            "/v1/clusters/:provider/:name/nodepools/:pool",
            delete(clusters::delete_node),
        )
        // Credentials
        .route(
            "/v1/credentials/:provider/:account",
            put(credentials::add_credential),
        )
        // Volumes
        .route("/v1/volumes/:provider", post(volumes::create_volume))
        .route(
            "/v1/volumes/:provider/:volume_id",
            delete(volumes::delete_volume),
        )
        .route(
            "/v1/volumes/:provider/:volume_id/snapshots",
            post(volumes::create_snapshot),
        )
        // Costs
        .route("/v1/costs/:provider", get(volumes::get_cost))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
