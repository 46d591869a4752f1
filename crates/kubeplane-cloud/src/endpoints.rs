//! Broker endpoint configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use kubeplane_core::Provider;

use crate::api::CloudApi;
use crate::error::Result;
use crate::http::HttpCloudApi;

/// Base URLs of the per-provider brokers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudEndpoints {
    endpoints: BTreeMap<Provider, String>,
}

impl CloudEndpoints {
    /// Read `KUBEPLANE_<PROVIDER>_ENDPOINT` for every provider.
    ///
    /// Providers without the variable are left unconfigured.
    #[must_use]
    pub fn from_env() -> Self {
        let endpoints = Provider::ALL
            .into_iter()
            .filter_map(|provider| {
                std::env::var(format!("KUBEPLANE_{}_ENDPOINT", provider.env_prefix()))
                    .ok()
                    .filter(|url| !url.is_empty())
                    .map(|url| (provider, url))
            })
            .collect();
        Self { endpoints }
    }

    /// Set the endpoint of one provider.
    #[must_use]
    pub fn with(mut self, provider: Provider, base_url: impl Into<String>) -> Self {
        self.endpoints.insert(provider, base_url.into());
        self
    }

    /// Endpoint of one provider.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<&str> {
        self.endpoints.get(&provider).map(String::as_str)
    }

    /// Build an HTTP client for every configured provider.
    ///
    /// AWS brokers expose block storage; the others do not.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn build(&self) -> Result<Vec<Arc<dyn CloudApi>>> {
        self.endpoints
            .iter()
            .map(|(provider, url)| {
                let api = HttpCloudApi::new(*provider, url.clone())?;
                let api = if *provider == Provider::Aws {
                    api.with_volumes()
                } else {
                    api
                };
                Ok(Arc::new(api) as Arc<dyn CloudApi>)
            })
            .collect()
    }
}
