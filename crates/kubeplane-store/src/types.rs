//! Credential records held by the secret store.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use kubeplane_core::Provider;
use serde::{Deserialize, Serialize};

/// Identifies one stored credential: a provider-scoped account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId {
    /// The cloud the account belongs to.
    pub provider: Provider,
    /// Provider account, subscription or project identifier.
    pub account: String,
}

impl CredentialId {
    /// Create a new credential identifier.
    #[must_use]
    pub fn new(provider: Provider, account: impl Into<String>) -> Self {
        Self {
            provider,
            account: account.into(),
        }
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.account)
    }
}

/// A long-lived cloud credential.
///
/// `key_id` and `secret` carry the provider's primary key pair (access key,
/// client ID/secret, or service account email/key). Anything else a provider
/// needs, such as an Azure tenant or a GCP project, goes in `extra`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Public half of the key pair.
    pub key_id: String,
    /// Secret half of the key pair.
    pub secret: String,
    /// Provider-specific fields.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// When the credential was stored.
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential with no extra fields.
    #[must_use]
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            secret: secret.into(),
            extra: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a provider-specific field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .field("created_at", &self.created_at)
            .finish()
    }
}
