//! Authenticated cloud sessions.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use kubeplane_core::{Provider, SessionId};

/// A bounded-lifetime credential bound to one provider, region and account.
///
/// Sessions are created per request and never cached.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    provider: Provider,
    region: String,
    account: String,
    access_key: String,
    secret_key: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a session that expires `ttl` from now.
    #[must_use]
    pub fn new(
        provider: Provider,
        region: impl Into<String>,
        account: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            provider,
            region: region.into(),
            account: account.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            expires_at: Utc::now() + ttl,
        }
    }

    /// Session identifier, used to correlate log lines.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// The provider this session talks to.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// The region this session is bound to.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The account, subscription or project this session is bound to.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Public half of the credential.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Secret half of the credential.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// When the credential stops being valid.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the credential has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("account", &self.account)
            .field("access_key", &self.access_key)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_secret() {
        let session = Session::new(
            Provider::Aws,
            "us-east-1",
            "123",
            "AKIA",
            "hunter2",
            Duration::minutes(15),
        );
        let debug = format!("{session:?}");
        assert!(debug.contains("us-east-1"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn expiry() {
        let live = Session::new(Provider::Gcp, "r", "a", "k", "s", Duration::minutes(5));
        assert!(!live.is_expired());
        let dead = Session::new(Provider::Gcp, "r", "a", "k", "s", Duration::seconds(-1));
        assert!(dead.is_expired());
    }
}
