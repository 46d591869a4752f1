//! Credential secret store for kubeplane.
//!
//! Remote deployments resolve cloud sessions from credentials held here,
//! keyed by provider and account. Two implementations are provided:
//!
//! - [`RocksSecretStore`]: persistent, `RocksDB`-backed
//! - [`MemorySecretStore`]: process-local, for local mode and tests
//!
//! # Example
//!
//! ```no_run
//! use kubeplane_core::Provider;
//! use kubeplane_store::{Credential, CredentialId, RocksSecretStore, SecretStore};
//!
//! let store = RocksSecretStore::open("/tmp/kubeplane-secrets").unwrap();
//! let id = CredentialId::new(Provider::Aws, "123456789012");
//! store.put(&id, &Credential::new("AKIA...", "secret")).unwrap();
//! assert!(store.get(&id).unwrap().is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemorySecretStore;
pub use rocks::RocksSecretStore;
pub use types::{Credential, CredentialId};

use kubeplane_core::Provider;

/// The storage trait for cloud credentials.
pub trait SecretStore: Send + Sync {
    /// Insert or replace the credential for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put(&self, id: &CredentialId, credential: &Credential) -> Result<()>;

    /// Get the credential for an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get(&self, id: &CredentialId) -> Result<Option<Credential>>;

    /// Delete the credential for an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no credential is stored.
    fn delete(&self, id: &CredentialId) -> Result<()>;

    /// List the accounts that have a credential for one provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts(&self, provider: Provider) -> Result<Vec<String>>;
}
