//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksSecretStore` implementation of the
//! `SecretStore` trait.

use std::path::Path;
use std::sync::Arc;

use kubeplane_core::Provider;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{Credential, CredentialId};
use crate::SecretStore;

/// RocksDB-backed secret store.
pub struct RocksSecretStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksSecretStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

impl SecretStore for RocksSecretStore {
    fn put(&self, id: &CredentialId, credential: &Credential) -> Result<()> {
        let cf = self.cf(cf::CREDENTIALS)?;
        let value = Self::serialize(credential)?;

        self.db
            .put_cf(&cf, keys::credential_key(id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(credential = %id, "Stored credential");
        Ok(())
    }

    fn get(&self, id: &CredentialId) -> Result<Option<Credential>> {
        let cf = self.cf(cf::CREDENTIALS)?;

        self.db
            .get_cf(&cf, keys::credential_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn delete(&self, id: &CredentialId) -> Result<()> {
        let cf = self.cf(cf::CREDENTIALS)?;
        let key = keys::credential_key(id);

        let exists = self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound);
        }

        self.db
            .delete_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn list_accounts(&self, provider: Provider) -> Result<Vec<String>> {
        let cf = self.cf(cf::CREDENTIALS)?;
        let prefix = keys::provider_prefix(provider);

        let mut accounts = Vec::new();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            accounts.push(keys::decode_credential_key(&key)?.account);
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksSecretStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksSecretStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn credential_crud() {
        let (store, _dir) = create_test_store();
        let id = CredentialId::new(Provider::Aws, "123456789012");
        let credential = Credential::new("AKIA123", "secret");

        assert!(store.get(&id).unwrap().is_none());

        store.put(&id, &credential).unwrap();
        let retrieved = store.get(&id).unwrap().unwrap();
        assert_eq!(retrieved, credential);

        let rotated = Credential::new("AKIA456", "rotated");
        store.put(&id, &rotated).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().key_id, "AKIA456");

        store.delete(&id).unwrap();
        assert!(store.get(&id).unwrap().is_none());
        assert!(matches!(store.delete(&id), Err(StoreError::NotFound)));
    }

    #[test]
    fn list_accounts_is_scoped_to_provider() {
        let (store, _dir) = create_test_store();
        let credential = Credential::new("k", "s");

        store
            .put(&CredentialId::new(Provider::Aws, "a1"), &credential)
            .unwrap();
        store
            .put(&CredentialId::new(Provider::Aws, "a2"), &credential)
            .unwrap();
        store
            .put(&CredentialId::new(Provider::Azure, "z1"), &credential)
            .unwrap();

        let mut aws = store.list_accounts(Provider::Aws).unwrap();
        aws.sort();
        assert_eq!(aws, vec!["a1", "a2"]);
        assert_eq!(store.list_accounts(Provider::Azure).unwrap(), vec!["z1"]);
        assert!(store.list_accounts(Provider::Gcp).unwrap().is_empty());
    }

    #[test]
    fn extra_fields_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = CredentialId::new(Provider::Azure, "sub-1");
        let credential = Credential::new("client", "secret").with_extra("tenant_id", "t-9");

        {
            let store = RocksSecretStore::open(dir.path()).unwrap();
            store.put(&id, &credential).unwrap();
        }

        let store = RocksSecretStore::open(dir.path()).unwrap();
        let retrieved = store.get(&id).unwrap().unwrap();
        assert_eq!(
            retrieved.extra.get("tenant_id").map(String::as_str),
            Some("t-9")
        );
    }
}
