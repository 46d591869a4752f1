//! Credential endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use kubeplane_store::Credential;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Request to store a credential.
#[derive(Deserialize)]
pub struct CredentialBody {
    /// Public half of the key pair.
    pub key_id: String,
    /// Secret half of the key pair.
    pub secret: String,
    /// Provider-specific fields.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Store the credential of one provider account.
///
/// # Errors
///
/// Returns an error if the body is incomplete or the store write fails.
pub async fn add_credential(
    State(state): State<Arc<GatewayState>>,
    Path((provider, account)): Path<(String, String)>,
    Json(body): Json<CredentialBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.key_id.is_empty() || body.secret.is_empty() {
        return Err(ApiError::BadRequest(
            "key_id and secret are required".to_string(),
        ));
    }

    let credential = body
        .extra
        .into_iter()
        .fold(Credential::new(body.key_id, body.secret), |c, (k, v)| {
            c.with_extra(k, v)
        });
    state
        .service
        .add_credential(&provider, &account, &credential)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
