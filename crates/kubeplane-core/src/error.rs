//! Common error types for kubeplane.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur throughout the kubeplane system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The provider tag does not name a supported cloud.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// A resource name failed validation.
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        /// What kind of resource was being named.
        kind: &'static str,
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}
