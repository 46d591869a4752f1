//! Volume, snapshot and cost endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use kubeplane_control::{CostQuery, CreateVolumeRequest, Location};

use super::LocationQuery;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Query parameters for snapshot creation.
#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Provider region.
    pub region: String,
    /// Provider account.
    pub account: String,
    /// Delete the volume once the snapshot completes.
    #[serde(default)]
    pub delete_volume: bool,
}

/// Query parameters for cost reports.
#[derive(Debug, Deserialize)]
pub struct CostParams {
    /// Provider region.
    pub region: String,
    /// Provider account.
    pub account: String,
    /// Start of the period.
    pub start: DateTime<Utc>,
    /// End of the period.
    pub end: DateTime<Utc>,
}

/// Create a volume.
///
/// # Errors
///
/// Returns `not_implemented` on providers without block storage.
pub async fn create_volume(
    State(state): State<Arc<GatewayState>>,
    Path(provider): Path<String>,
    Query(location): Query<LocationQuery>,
    Json(request): Json<CreateVolumeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let volume = state
        .service
        .create_volume(&provider, &location.into(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(volume)))
}

/// Delete a volume.
///
/// # Errors
///
/// Returns `not_implemented` on providers without block storage.
pub async fn delete_volume(
    State(state): State<Arc<GatewayState>>,
    Path((provider, volume_id)): Path<(String, String)>,
    Query(location): Query<LocationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .delete_volume(&provider, &location.into(), &volume_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Snapshot a volume, optionally deleting it afterwards.
///
/// # Errors
///
/// Returns `not_implemented` on providers without block storage.
pub async fn create_snapshot(
    State(state): State<Arc<GatewayState>>,
    Path((provider, volume_id)): Path<(String, String)>,
    Query(query): Query<SnapshotQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let location = Location::new(query.region, query.account);
    let snapshot = if query.delete_volume {
        state
            .service
            .create_snapshot_and_delete(&provider, &location, &volume_id)
            .await?
    } else {
        state
            .service
            .create_snapshot(&provider, &location, &volume_id)
            .await?
    };
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Report costs for a period.
///
/// # Errors
///
/// Returns `not_implemented`; no provider reports costs yet.
pub async fn get_cost(
    State(state): State<Arc<GatewayState>>,
    Path(provider): Path<String>,
    Query(params): Query<CostParams>,
) -> Result<impl IntoResponse, ApiError> {
    let location = Location::new(params.region, params.account);
    let query = CostQuery {
        start: params.start,
        end: params.end,
    };
    let report = state
        .service
        .get_cost(&provider, &location, &query)
        .await?;
    Ok(Json(report))
}
