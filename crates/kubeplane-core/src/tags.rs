//! Ownership and scope tags.
//!
//! Every resource kubeplane creates carries an owner marker and a scope
//! marker. Discovery only ever adopts resources whose markers match the
//! running deployment, and destructive calls are refused when they don't, so
//! two environments can share one cloud account without touching each other.

use std::collections::BTreeMap;

/// Key/value labels attached to a cloud resource.
pub type Tags = BTreeMap<String, String>;

/// Tag key naming the system that owns a resource.
pub const OWNER_KEY: &str = "kubeplane.io/owner";
/// Tag key naming the deployment scope a resource belongs to.
pub const SCOPE_KEY: &str = "kubeplane.io/scope";
/// Tag key naming the component that provisioned a shared resource.
pub const PROVISIONER_KEY: &str = "kubeplane.io/provisioner";
/// Tag key naming the system that created a cluster.
pub const CREATOR_KEY: &str = "kubeplane.io/creator";
/// Tag key for the human-readable resource name.
pub const NAME_KEY: &str = "Name";

/// The owner and scope markers of one kubeplane deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    owner: String,
    scope: String,
}

impl Ownership {
    /// Create ownership markers for the given owner and scope.
    #[must_use]
    pub fn new(owner: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            scope: scope.into(),
        }
    }

    /// The owner marker.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The scope marker.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The base tag set: owner and scope.
    #[must_use]
    pub fn tags(&self) -> Tags {
        let mut tags = Tags::new();
        tags.insert(OWNER_KEY.to_string(), self.owner.clone());
        tags.insert(SCOPE_KEY.to_string(), self.scope.clone());
        tags
    }

    /// Tags for a shared resource: owner, scope, provisioner and name.
    #[must_use]
    pub fn provisioned_tags(&self, provisioner: &str, name: &str) -> Tags {
        let mut tags = self.tags();
        tags.insert(PROVISIONER_KEY.to_string(), provisioner.to_string());
        tags.insert(NAME_KEY.to_string(), name.to_string());
        tags
    }

    /// Tags for a cluster: owner, scope and creator.
    #[must_use]
    pub fn cluster_tags(&self) -> Tags {
        let mut tags = self.tags();
        tags.insert(CREATOR_KEY.to_string(), self.owner.clone());
        tags
    }

    /// Whether `tags` carry this deployment's owner and scope markers.
    #[must_use]
    pub fn matches(&self, tags: &Tags) -> bool {
        tags.get(OWNER_KEY) == Some(&self.owner) && self.in_scope(tags)
    }

    /// Whether `tags` carry this deployment's scope marker.
    #[must_use]
    pub fn in_scope(&self, tags: &Tags) -> bool {
        tags.get(SCOPE_KEY) == Some(&self.scope)
    }

    /// Whether a cluster's tags mark it as created by this deployment.
    #[must_use]
    pub fn created_cluster(&self, tags: &Tags) -> bool {
        tags.get(CREATOR_KEY) == Some(&self.owner) && self.in_scope(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_own_markers() {
        let ownership = Ownership::new("kubeplane", "prod");
        assert!(ownership.matches(&ownership.tags()));
        assert!(ownership.matches(&ownership.provisioned_tags("network", "n")));
    }

    #[test]
    fn other_scope_does_not_match() {
        let prod = Ownership::new("kubeplane", "prod");
        let staging = Ownership::new("kubeplane", "staging");
        assert!(!prod.matches(&staging.tags()));
        assert!(!prod.in_scope(&staging.tags()));
    }

    #[test]
    fn untagged_resource_does_not_match() {
        let ownership = Ownership::new("kubeplane", "prod");
        assert!(!ownership.matches(&Tags::new()));
        assert!(!ownership.created_cluster(&Tags::new()));
    }

    #[test]
    fn cluster_tags_mark_creator() {
        let ownership = Ownership::new("kubeplane", "prod");
        let tags = ownership.cluster_tags();
        assert!(ownership.created_cluster(&tags));
        assert_eq!(tags.get(CREATOR_KEY).map(String::as_str), Some("kubeplane"));
    }
}
