//! Kubernetes node listing.
//!
//! This module provides the `KubeClusterApi` which connects to a managed
//! cluster's API server from a kubeconfig document and reads its nodes.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::types::{NodeInfo, NodesConfig};
use crate::Result;

const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";
const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// The `ClusterApi` trait reads node state from a cluster's API server.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List the nodes of the cluster the kubeconfig points at.
    ///
    /// # Errors
    ///
    /// Returns an error if the kubeconfig is invalid or the API call fails.
    async fn list_nodes(&self, kubeconfig: &str) -> Result<Vec<NodeInfo>>;
}

/// Kubernetes-backed node listing.
///
/// A new client is built per call; clusters come and go and their
/// credentials are short-lived.
#[derive(Debug, Clone, Default)]
pub struct KubeClusterApi {
    config: NodesConfig,
}

impl KubeClusterApi {
    /// Create a new node lister.
    #[must_use]
    pub const fn new(config: NodesConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config.
    #[must_use]
    pub const fn config(&self) -> &NodesConfig {
        &self.config
    }

    async fn client(&self, kubeconfig: &str) -> Result<Client> {
        let kubeconfig = Kubeconfig::from_yaml(kubeconfig)?;
        let mut config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        config.connect_timeout = Some(self.config.connect_timeout);
        config.read_timeout = Some(self.config.read_timeout);
        Ok(Client::try_from(config)?)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn list_nodes(&self, kubeconfig: &str) -> Result<Vec<NodeInfo>> {
        let client = self.client(kubeconfig).await?;
        let nodes: Api<Node> = Api::all(client);

        let list = nodes.list(&ListParams::default()).await?;
        debug!(count = list.items.len(), "Listed cluster nodes");

        Ok(list
            .items
            .iter()
            .map(|node| node_info(node, &self.config.pool_label_keys))
            .collect())
    }
}

/// Check whether a node's `Ready` condition is `True`.
#[must_use]
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

fn node_address(node: &Node, kind: &str) -> Option<String> {
    node.status
        .as_ref()
        .and_then(|s| s.addresses.as_ref())
        .and_then(|addresses| addresses.iter().find(|a| a.type_ == kind))
        .map(|a| a.address.clone())
}

/// Convert a Kubernetes node into a [`NodeInfo`].
#[must_use]
pub fn node_info(node: &Node, pool_label_keys: &[String]) -> NodeInfo {
    let labels = node.metadata.labels.as_ref();
    let label = |key: &str| labels.and_then(|l| l.get(key)).cloned();

    NodeInfo {
        name: node.metadata.name.clone().unwrap_or_default(),
        ready: is_node_ready(node),
        node_pool: pool_label_keys.iter().find_map(|key| label(key.as_str())),
        instance_type: label(INSTANCE_TYPE_LABEL),
        zone: label(ZONE_LABEL),
        internal_ip: node_address(node, "InternalIP"),
        external_ip: node_address(node, "ExternalIP"),
        kubelet_version: node
            .status
            .as_ref()
            .and_then(|s| s.node_info.as_ref())
            .map(|i| i.kubelet_version.clone()),
        created_at: node.metadata.creation_timestamp.as_ref().map(|t| t.0),
    }
}

/// Mock node listing for testing.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use crate::NodesError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A mock cluster API that serves canned nodes per kubeconfig.
    #[derive(Default)]
    pub struct MockClusterApi {
        nodes: Mutex<HashMap<String, Vec<NodeInfo>>>,
        unreachable: Mutex<bool>,
        requests: Mutex<usize>,
    }

    impl MockClusterApi {
        /// Create a new mock cluster API.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the nodes returned for a kubeconfig.
        pub fn set_nodes(&self, kubeconfig: &str, nodes: Vec<NodeInfo>) {
            self.nodes.lock().insert(kubeconfig.to_string(), nodes);
        }

        /// Make every call fail as if the API server were unreachable.
        pub fn set_unreachable(&self, unreachable: bool) {
            *self.unreachable.lock() = unreachable;
        }

        /// Get the number of list calls made.
        #[must_use]
        pub fn request_count(&self) -> usize {
            *self.requests.lock()
        }
    }

    #[async_trait]
    impl ClusterApi for MockClusterApi {
        async fn list_nodes(&self, kubeconfig: &str) -> Result<Vec<NodeInfo>> {
            *self.requests.lock() += 1;

            if *self.unreachable.lock() {
                return Err(NodesError::Config("API server unreachable".to_string()));
            }

            Ok(self
                .nodes
                .lock()
                .get(kubeconfig)
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockClusterApi;
    use super::*;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeCondition, NodeStatus, NodeSystemInfo};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn node(name: &str, ready: &str) -> Node {
        let mut labels = BTreeMap::new();
        labels.insert("eks.amazonaws.com/nodegroup".to_string(), "default".to_string());
        labels.insert(INSTANCE_TYPE_LABEL.to_string(), "m5.large".to_string());
        labels.insert(ZONE_LABEL.to_string(), "us-east-1a".to_string());

        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: None,
            status: Some(NodeStatus {
                conditions: Some(vec![NodeCondition {
                    type_: "Ready".to_string(),
                    status: ready.to_string(),
                    ..Default::default()
                }]),
                addresses: Some(vec![
                    NodeAddress {
                        type_: "InternalIP".to_string(),
                        address: "192.168.1.10".to_string(),
                    },
                    NodeAddress {
                        type_: "ExternalIP".to_string(),
                        address: "54.1.2.3".to_string(),
                    },
                ]),
                node_info: Some(NodeSystemInfo {
                    kubelet_version: "v1.31.2".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn node_info_reads_labels_and_addresses() {
        let keys = NodesConfig::default().pool_label_keys;
        let info = node_info(&node("ip-192-168-1-10", "True"), &keys);

        assert_eq!(info.name, "ip-192-168-1-10");
        assert!(info.ready);
        assert_eq!(info.node_pool.as_deref(), Some("default"));
        assert_eq!(info.instance_type.as_deref(), Some("m5.large"));
        assert_eq!(info.zone.as_deref(), Some("us-east-1a"));
        assert_eq!(info.internal_ip.as_deref(), Some("192.168.1.10"));
        assert_eq!(info.external_ip.as_deref(), Some("54.1.2.3"));
        assert_eq!(info.kubelet_version.as_deref(), Some("v1.31.2"));
    }

    #[test]
    fn node_not_ready() {
        assert!(!is_node_ready(&node("n", "False")));
        assert!(!is_node_ready(&Node::default()));
    }

    #[tokio::test]
    async fn mock_serves_nodes_per_kubeconfig() {
        let api = MockClusterApi::new();
        let info = node_info(&node("n1", "True"), &[]);
        api.set_nodes("kc-1", vec![info.clone()]);

        assert_eq!(api.list_nodes("kc-1").await.unwrap(), vec![info]);
        assert!(api.list_nodes("kc-2").await.unwrap().is_empty());

        api.set_unreachable(true);
        assert!(api.list_nodes("kc-1").await.is_err());
        assert_eq!(api.request_count(), 3);
    }

    #[tokio::test]
    async fn invalid_kubeconfig_is_rejected() {
        let api = KubeClusterApi::default();
        let err = api.list_nodes("{not: [yaml").await.unwrap_err();
        assert!(matches!(err, crate::NodesError::Kubeconfig(_)));
    }
}
