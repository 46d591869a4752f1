//! Key encoding utilities for `RocksDB`.
//!
//! Credential keys are `provider || '/' || account` so a prefix scan over
//! `provider || '/'` lists every account stored for one provider.

use kubeplane_core::Provider;

use crate::error::{Result, StoreError};
use crate::types::CredentialId;

const SEPARATOR: u8 = b'/';

/// Encode a credential key.
#[must_use]
pub fn credential_key(id: &CredentialId) -> Vec<u8> {
    let mut key = provider_prefix(id.provider);
    key.extend_from_slice(id.account.as_bytes());
    key
}

/// Encode a provider prefix for scanning all credentials of one provider.
#[must_use]
pub fn provider_prefix(provider: Provider) -> Vec<u8> {
    let tag = provider.as_str().as_bytes();
    let mut key = Vec::with_capacity(tag.len() + 1);
    key.extend_from_slice(tag);
    key.push(SEPARATOR);
    key
}

/// Decode a credential key back into its identifier.
///
/// # Errors
///
/// Returns `StoreError::MalformedKey` if the key has no separator, names an
/// unknown provider, or is not UTF-8.
pub fn decode_credential_key(key: &[u8]) -> Result<CredentialId> {
    let text = std::str::from_utf8(key)
        .map_err(|_| StoreError::MalformedKey(format!("{key:?}")))?;
    let (provider, account) = text
        .split_once(char::from(SEPARATOR))
        .ok_or_else(|| StoreError::MalformedKey(text.to_string()))?;
    let provider = provider
        .parse::<Provider>()
        .map_err(|_| StoreError::MalformedKey(text.to_string()))?;
    Ok(CredentialId::new(provider, account))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_starts_with_provider_prefix() {
        let id = CredentialId::new(Provider::Gcp, "project-7");
        let key = credential_key(&id);
        assert!(key.starts_with(&provider_prefix(Provider::Gcp)));
        assert!(!key.starts_with(&provider_prefix(Provider::Aws)));
    }

    #[test]
    fn decode_recovers_identifier() {
        let id = CredentialId::new(Provider::Aws, "123456789012");
        assert_eq!(decode_credential_key(&credential_key(&id)).unwrap(), id);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_credential_key(b"no-separator").is_err());
        assert!(decode_credential_key(b"ibm/acct").is_err());
    }
}
