//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod clusters;
pub mod credentials;
pub mod health;
pub mod volumes;

use serde::Deserialize;

use kubeplane_control::Location;

/// The `region` and `account` query parameters most endpoints take.
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    /// Provider region.
    pub region: String,
    /// Provider account, subscription or project.
    pub account: String,
}

impl From<LocationQuery> for Location {
    fn from(query: LocationQuery) -> Self {
        Self::new(query.region, query.account)
    }
}
