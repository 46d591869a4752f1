//! Error types for the control plane.
//!
//! This module defines all errors that can occur while provisioning and
//! tearing down clusters, node pools and their prerequisites.

use kubeplane_cloud::{ClusterStatus, CloudError};
use kubeplane_core::{CoreError, Provider};
use thiserror::Error;

use crate::teardown::TeardownReport;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur in control plane operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No controller is registered for the provider tag.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// The operation is not supported by this provider.
    #[error("{operation} is not implemented for provider {provider}")]
    NotImplemented {
        /// The provider that was asked.
        provider: Provider,
        /// The unsupported operation.
        operation: &'static str,
    },

    /// The request was rejected before any cloud call.
    #[error("validation error: {0}")]
    Validation(String),

    /// A cluster with this name already exists.
    #[error("cluster already exists: {0}")]
    ClusterExists(String),

    /// The requested cluster was not found.
    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    /// The cluster must be ACTIVE for this operation.
    #[error("cluster {name} is not active (status {status})")]
    ClusterNotActive {
        /// The cluster name.
        name: String,
        /// The status it was found in.
        status: ClusterStatus,
    },

    /// The cluster never reached ACTIVE within the activation schedule.
    #[error("cluster {name} did not become active (last status {last_status})")]
    ActivationFailed {
        /// The cluster name.
        name: String,
        /// The last status observed.
        last_status: ClusterStatus,
    },

    /// A node pool with this name already exists in the cluster.
    #[error("node group {pool} already exists in cluster {cluster}")]
    NodeGroupExists {
        /// The cluster name.
        cluster: String,
        /// The node pool name.
        pool: String,
    },

    /// The requested node pool was not found.
    #[error("node group {pool} not found in cluster {cluster}")]
    NodeGroupNotFound {
        /// The cluster name.
        cluster: String,
        /// The node pool name.
        pool: String,
    },

    /// The resource belongs to a different deployment scope.
    #[error("{kind} {name} is not in scope {expected} (found {found:?})")]
    ScopeMismatch {
        /// Kind of resource checked.
        kind: &'static str,
        /// Resource name.
        name: String,
        /// The configured scope.
        expected: String,
        /// The scope tag on the resource, if any.
        found: Option<String>,
    },

    /// A matching network exists but is missing some of its parts.
    #[error("network {network_id} is half-provisioned, missing: {}", missing.join(", "))]
    NetworkHalfProvisioned {
        /// The discovered network.
        network_id: String,
        /// The parts that could not be found.
        missing: Vec<String>,
    },

    /// One or more rollback steps failed.
    #[error("rollback incomplete: {}", .0.join("; "))]
    RollbackIncomplete(Vec<String>),

    /// The bounded wait for node pool deletions ran out.
    #[error("node pool deletion timed out: {0}")]
    TeardownTimedOut(TeardownReport),

    /// One or more node pool deletions failed.
    #[error("node pool deletion failed: {0}")]
    TeardownFailed(TeardownReport),

    /// No credential is configured for the account.
    #[error("no credential for {provider} account {account}")]
    CredentialNotFound {
        /// The provider.
        provider: Provider,
        /// The account.
        account: String,
    },

    /// The session expired before it could be used.
    #[error("session for {provider} account {account} has expired")]
    SessionExpired {
        /// The provider.
        provider: Provider,
        /// The account.
        account: String,
    },

    /// Invalid identifier or name.
    #[error("invalid input: {0}")]
    Core(#[from] CoreError),

    /// Cloud provider error.
    #[error("cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Cluster API error.
    #[error("cluster API error: {0}")]
    Nodes(#[from] kubeplane_nodes::NodesError),

    /// Secret store error.
    #[error("storage error: {0}")]
    Store(#[from] kubeplane_store::StoreError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Core(_) => 400,
            Self::SessionExpired { .. } => 401,
            Self::ScopeMismatch { .. } => 403,
            Self::ProviderNotFound(_)
            | Self::ClusterNotFound(_)
            | Self::NodeGroupNotFound { .. }
            | Self::CredentialNotFound { .. } => 404,
            Self::ClusterExists(_)
            | Self::ClusterNotActive { .. }
            | Self::NodeGroupExists { .. }
            | Self::NetworkHalfProvisioned { .. } => 409,
            Self::NotImplemented { .. } => 501,
            Self::Cloud(e) => match e {
                CloudError::NotFound { .. } => 404,
                CloudError::Conflict(_) => 409,
                CloudError::Transport(_) => 503,
                CloudError::Timeout(_) => 504,
                CloudError::Api { .. } => 502,
            },
            Self::TeardownTimedOut(_) => 504,
            Self::TeardownFailed(_) | Self::ActivationFailed { .. } => 502,
            Self::Nodes(_) => 503,
            Self::RollbackIncomplete(_) | Self::Store(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Cloud(e) => e.is_retriable(),
            Self::Nodes(e) => e.is_retriable(),
            Self::TeardownTimedOut(_) | Self::SessionExpired { .. } => true,
            _ => false,
        }
    }

    /// A stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::Validation(_) | Self::Core(_) => "VALIDATION_ERROR",
            Self::ClusterExists(_) => "CLUSTER_EXISTS",
            Self::ClusterNotFound(_) => "CLUSTER_NOT_FOUND",
            Self::ClusterNotActive { .. } => "CLUSTER_NOT_ACTIVE",
            Self::ActivationFailed { .. } => "ACTIVATION_FAILED",
            Self::NodeGroupExists { .. } => "NODE_GROUP_EXISTS",
            Self::NodeGroupNotFound { .. } => "NODE_GROUP_NOT_FOUND",
            Self::ScopeMismatch { .. } => "SCOPE_MISMATCH",
            Self::NetworkHalfProvisioned { .. } => "NETWORK_HALF_PROVISIONED",
            Self::RollbackIncomplete(_) => "ROLLBACK_INCOMPLETE",
            Self::TeardownTimedOut(_) => "TEARDOWN_TIMED_OUT",
            Self::TeardownFailed(_) => "TEARDOWN_FAILED",
            Self::CredentialNotFound { .. } => "CREDENTIAL_NOT_FOUND",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::Cloud(CloudError::NotFound { .. }) => "NOT_FOUND",
            Self::Cloud(CloudError::Conflict(_)) => "CONFLICT",
            Self::Cloud(_) => "CLOUD_ERROR",
            Self::Nodes(_) => "CLUSTER_API_ERROR",
            Self::Store(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
