//! Per-provider identity settings.

use kubeplane_core::Provider;
use serde_json::{json, Value};

/// The identity details that differ between providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    /// The provider.
    pub provider: Provider,
    /// Service principal that assumes the cluster role.
    pub cluster_principal: &'static str,
    /// Service principal that assumes the node role.
    pub node_principal: &'static str,
    /// Policies attached to a freshly created cluster role.
    pub cluster_policies: &'static [&'static str],
    /// The standard worker policies attached to a freshly created node role.
    pub worker_policies: [&'static str; 3],
}

const AWS: ProviderProfile = ProviderProfile {
    provider: Provider::Aws,
    cluster_principal: "eks.amazonaws.com",
    node_principal: "ec2.amazonaws.com",
    cluster_policies: &["arn:aws:iam::aws:policy/AmazonEKSClusterPolicy"],
    worker_policies: [
        "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
        "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
        "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
    ],
};

const AZURE: ProviderProfile = ProviderProfile {
    provider: Provider::Azure,
    cluster_principal: "aks.azure.com",
    node_principal: "compute.azure.com",
    cluster_policies: &["Azure Kubernetes Service Contributor Role"],
    worker_policies: [
        "AcrPull",
        "Network Contributor",
        "Monitoring Metrics Publisher",
    ],
};

const GCP: ProviderProfile = ProviderProfile {
    provider: Provider::Gcp,
    cluster_principal: "container.googleapis.com",
    node_principal: "compute.googleapis.com",
    cluster_policies: &["roles/container.serviceAgent"],
    worker_policies: [
        "roles/container.defaultNodeServiceAccount",
        "roles/logging.logWriter",
        "roles/artifactregistry.reader",
    ],
};

impl ProviderProfile {
    /// The profile for a provider.
    #[must_use]
    pub const fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::Aws => AWS,
            Provider::Azure => AZURE,
            Provider::Gcp => GCP,
        }
    }

    /// Trust policy letting the cluster service assume the cluster role.
    #[must_use]
    pub fn cluster_trust_policy(&self) -> Value {
        trust_policy(self.cluster_principal)
    }

    /// Trust policy letting compute instances assume the node role.
    #[must_use]
    pub fn node_trust_policy(&self) -> Value {
        trust_policy(self.node_principal)
    }
}

fn trust_policy(principal: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": principal },
            "Action": "sts:AssumeRole"
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_policy_names_the_principal() {
        let profile = ProviderProfile::for_provider(Provider::Aws);
        let policy = profile.node_trust_policy();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            "ec2.amazonaws.com"
        );
        assert_eq!(policy["Statement"][0]["Action"], "sts:AssumeRole");
    }

    #[test]
    fn every_provider_has_a_profile() {
        for provider in Provider::ALL {
            assert_eq!(ProviderProfile::for_provider(provider).provider, provider);
        }
    }
}
