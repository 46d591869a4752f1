//! Session and credential resolution.
//!
//! Every request gets a fresh [`Session`] bound to one provider, region and
//! account. Sessions are never cached. A long operation calls
//! [`SessionResolver::refresh`] before its next cloud call; a session that
//! has already expired is refused rather than renewed.

use std::sync::Arc;

use kubeplane_cloud::Session;
use kubeplane_core::{Provider, RequestToken};
use serde::Serialize;
use kubeplane_store::{Credential, CredentialId, SecretStore};
use tracing::debug;

use crate::error::{ControlError, Result};
use crate::types::{ControlConfig, DeploymentMode, Location};

/// Resolves `(provider, region, account)` into an authenticated session.
pub struct SessionResolver {
    config: Arc<ControlConfig>,
    secrets: Arc<dyn SecretStore>,
}

impl SessionResolver {
    /// Create a new resolver.
    #[must_use]
    pub fn new(config: Arc<ControlConfig>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { config, secrets }
    }

    /// Resolve a session for one provider location.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::CredentialNotFound` if no credential is
    /// configured for the account, or a storage error.
    pub fn resolve(&self, provider: Provider, location: &Location) -> Result<Session> {
        let (access_key, secret_key) = match self.config.deployment_mode {
            DeploymentMode::Local => {
                let credential = self.config.local_credentials.get(&provider).ok_or_else(|| {
                    ControlError::CredentialNotFound {
                        provider,
                        account: location.account.clone(),
                    }
                })?;
                (
                    credential.access_key.clone(),
                    credential.secret_key.clone(),
                )
            }
            DeploymentMode::Remote => {
                let id = CredentialId::new(provider, location.account.clone());
                let credential =
                    self.secrets
                        .get(&id)?
                        .ok_or_else(|| ControlError::CredentialNotFound {
                            provider,
                            account: location.account.clone(),
                        })?;
                (credential.key_id, credential.secret)
            }
        };

        let ttl = chrono::Duration::from_std(self.config.session_ttl())
            .map_err(|e| ControlError::Internal(format!("invalid session lifetime: {e}")))?;
        let session = Session::new(
            provider,
            location.region.clone(),
            location.account.clone(),
            access_key,
            secret_key,
            ttl,
        );

        debug!(
            session_id = %session.id(),
            %provider,
            region = %location.region,
            account = %location.account,
            expires_at = %session.expires_at(),
            "Resolved session"
        );
        Ok(session)
    }

    /// Reject a session whose credential has expired.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::SessionExpired` if the session is past its
    /// lifetime.
    pub fn ensure_live(session: &Session) -> Result<()> {
        if session.is_expired() {
            return Err(ControlError::SessionExpired {
                provider: session.provider(),
                account: session.account().to_string(),
            });
        }
        Ok(())
    }

    /// Renew a live session with a fresh lifetime for the same location.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::SessionExpired` if `session` has already
    /// expired, or any error from [`SessionResolver::resolve`].
    pub fn refresh(&self, session: Session) -> Result<Session> {
        Self::ensure_live(&session)?;
        debug!(session_id = %session.id(), "Renewing session");
        let location = Location::new(session.region(), session.account());
        self.resolve(session.provider(), &location)
    }

    /// Store a credential for an account.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write fails.
    pub fn add_credential(
        &self,
        provider: Provider,
        account: &str,
        credential: &Credential,
    ) -> Result<()> {
        let id = CredentialId::new(provider, account);
        self.secrets.put(&id, credential)?;
        debug!(%provider, account, "Stored credential");
        Ok(())
    }
}

/// Idempotency token for one mutating request.
///
/// The token covers the whole request body and the session it is sent
/// with. Retries inside one request replay the same token; a new request,
/// or a different body under the same name, gets a different one.
///
/// # Errors
///
/// Returns `ControlError::Internal` if `input` cannot be serialized.
pub fn request_token<T: Serialize>(
    operation: &str,
    session: &Session,
    input: &T,
) -> Result<RequestToken> {
    let body = serde_json::to_string(input)
        .map_err(|e| ControlError::Internal(format!("Failed to encode {operation}: {e}")))?;
    Ok(RequestToken::derive(&[
        operation,
        &session.id().to_string(),
        &body,
    ]))
}
