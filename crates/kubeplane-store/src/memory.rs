//! In-memory secret store.
//!
//! Used by local deployments that seed credentials at startup and by tests.

use std::collections::HashMap;

use kubeplane_core::Provider;
use parking_lot::RwLock;

use crate::error::{Result, StoreError};
use crate::types::{Credential, CredentialId};
use crate::SecretStore;

/// A secret store that keeps credentials in process memory.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    credentials: RwLock<HashMap<CredentialId, Credential>>,
}

impl MemorySecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.read().is_empty()
    }
}

impl SecretStore for MemorySecretStore {
    fn put(&self, id: &CredentialId, credential: &Credential) -> Result<()> {
        self.credentials
            .write()
            .insert(id.clone(), credential.clone());
        Ok(())
    }

    fn get(&self, id: &CredentialId) -> Result<Option<Credential>> {
        Ok(self.credentials.read().get(id).cloned())
    }

    fn delete(&self, id: &CredentialId) -> Result<()> {
        self.credentials
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn list_accounts(&self, provider: Provider) -> Result<Vec<String>> {
        let mut accounts: Vec<String> = self
            .credentials
            .read()
            .keys()
            .filter(|id| id.provider == provider)
            .map(|id| id.account.clone())
            .collect();
        accounts.sort();
        Ok(accounts)
    }
}
