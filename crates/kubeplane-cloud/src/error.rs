//! Error types for cloud API calls.

use thiserror::Error;

/// Errors returned by a cloud resource provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// The requested resource does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Resource kind, e.g. `network` or `nodegroup`.
        kind: &'static str,
        /// Identifier or name that was looked up.
        id: String,
    },

    /// The provider rejected the call because of the resource's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The provider returned an error response.
    #[error("provider error {code}: {message}")]
    Api {
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },

    /// The call never reached the provider or its response was unreadable.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wait helper gave up before the resource reached the expected state.
    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl CloudError {
    /// Build a `NotFound` error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this error reports a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// A specialized Result type for cloud API calls.
pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = CloudError::not_found("role", "kubeplane-node-role");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "role not found: kubeplane-node-role");
        assert!(!CloudError::Conflict("busy".into()).is_not_found());
    }
}
