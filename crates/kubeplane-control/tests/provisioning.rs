//! End-to-end provisioning scenarios against the in-memory cloud.

use std::sync::Arc;
use std::time::Duration;

use kubeplane_cloud::{CloudApi, CloudError, ClusterStatus, ManagedCluster, MockCloud};
use kubeplane_control::{
    ActivationPolicy, ClusterService, ClusterSpec, ControlConfig, ControlError, Location,
    NodeSpec, ProviderRegistry, SessionResolver,
};
use kubeplane_core::{Ownership, Provider};
use kubeplane_nodes::{ClusterApi, MockClusterApi};
use kubeplane_store::{Credential, MemorySecretStore};

const REGION: &str = "us-east-1";
const ACCOUNT: &str = "123456789012";

const NETWORK_OPERATIONS: [&str; 7] = [
    "create_network",
    "create_gateway",
    "attach_gateway",
    "create_route_table",
    "create_route",
    "create_subnet",
    "associate_route_table",
];

struct Harness {
    cloud: Arc<MockCloud>,
    service: ClusterService,
}

async fn harness() -> Harness {
    let cloud = Arc::new(MockCloud::new(Provider::Aws));
    let config = Arc::new(ControlConfig {
        scope: "prod".to_string(),
        poll_interval_seconds: 5,
        nodepool_delete_timeout_seconds: 300,
        ..ControlConfig::default()
    });
    let resolver = Arc::new(SessionResolver::new(
        Arc::clone(&config),
        Arc::new(MemorySecretStore::new()),
    ));
    let nodes: Arc<dyn ClusterApi> = Arc::new(MockClusterApi::new());
    let apis: Vec<Arc<dyn CloudApi>> = vec![cloud.clone()];

    let service = ClusterService::new(
        ProviderRegistry::managed(apis, &nodes, &resolver, &config),
        ActivationPolicy::from_secs(&[60, 30]),
    );
    service
        .add_credential("aws", ACCOUNT, &Credential::new("AKIA", "secret"))
        .await
        .unwrap();

    Harness { cloud, service }
}

fn location() -> Location {
    Location::new(REGION, ACCOUNT)
}

fn spec(name: &str) -> ClusterSpec {
    ClusterSpec {
        name: name.to_string(),
        provider: "aws".to_string(),
        region: REGION.to_string(),
        account: ACCOUNT.to_string(),
        default_node: None,
        labels: Default::default(),
    }
}

fn network_calls(cloud: &MockCloud) -> Vec<usize> {
    NETWORK_OPERATIONS.iter().map(|op| cloud.calls(op)).collect()
}

#[tokio::test]
async fn second_cluster_in_region_reuses_the_network() {
    let h = harness().await;

    h.service.create_cluster(&spec("c1")).await.unwrap();
    assert_eq!(network_calls(&h.cloud), vec![1, 1, 1, 1, 1, 3, 3]);
    assert_eq!(h.cloud.calls("create_cluster"), 1);
    assert_eq!(h.cloud.calls("create_role"), 1);

    h.service.create_cluster(&spec("c2")).await.unwrap();
    assert_eq!(network_calls(&h.cloud), vec![1, 1, 1, 1, 1, 3, 3]);
    assert_eq!(h.cloud.calls("create_cluster"), 2);
    assert_eq!(h.cloud.calls("create_role"), 1);

    assert_eq!(h.cloud.network_count(), 1);
    assert_eq!(h.cloud.subnet_count(), 3);
    assert_eq!(h.cloud.cluster_count(), 2);
}

#[tokio::test]
async fn cluster_names_are_unique_per_region() {
    let h = harness().await;
    h.service.create_cluster(&spec("c1")).await.unwrap();

    let err = h.service.create_cluster(&spec("c1")).await.unwrap_err();
    assert!(matches!(err, ControlError::ClusterExists(ref name) if name == "c1"));
    assert_eq!(err.http_status_code(), 409);
}

#[tokio::test]
async fn node_pools_need_an_active_cluster() {
    let h = harness().await;
    h.service.create_cluster(&spec("c1")).await.unwrap();

    let pool = NodeSpec::sized("default", "m");
    let err = h
        .service
        .add_node("aws", "c1", &location(), &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::ClusterNotActive { .. }));

    h.cloud.set_cluster_status(REGION, "c1", ClusterStatus::Active);
    h.service
        .add_node("aws", "c1", &location(), &pool)
        .await
        .unwrap();

    let err = h
        .service
        .add_node("aws", "c1", &location(), &pool)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::NodeGroupExists { .. }));

    let described = h
        .service
        .get_cluster("aws", "c1", &location())
        .await
        .unwrap();
    assert_eq!(described.node_pools.len(), 1);
    assert_eq!(
        described.node_pools[0].instance_types,
        vec!["m5.xlarge".to_string()]
    );
}

#[tokio::test]
async fn listing_skips_clusters_of_other_deployments() {
    let h = harness().await;
    h.service.create_cluster(&spec("mine")).await.unwrap();
    h.cloud.insert_cluster(
        REGION,
        ManagedCluster {
            name: "theirs".into(),
            id: "cluster-x".into(),
            status: ClusterStatus::Active,
            version: None,
            endpoint: None,
            role_id: "role/x".into(),
            subnet_ids: Vec::new(),
            tags: Ownership::new("someone-else", "prod").cluster_tags(),
        },
    );

    let clusters = h.service.get_clusters("aws", &location()).await.unwrap();
    let names: Vec<_> = clusters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["mine"]);

    let err = h
        .service
        .get_cluster("aws", "theirs", &location())
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::ClusterNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn force_delete_tears_down_pools_then_cluster() {
    let h = harness().await;
    h.service.create_cluster(&spec("c1")).await.unwrap();
    h.cloud.set_cluster_status(REGION, "c1", ClusterStatus::Active);
    for pool in ["cpu", "gpu"] {
        h.service
            .add_node("aws", "c1", &location(), &NodeSpec::sized(pool, "m"))
            .await
            .unwrap();
    }

    let err = h
        .service
        .delete_cluster("aws", "c1", &location(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Cloud(CloudError::Conflict(_))));

    h.cloud.set_node_pool_delete_delay(Duration::from_secs(90));
    h.service
        .delete_cluster("aws", "c1", &location(), true)
        .await
        .unwrap();

    assert!(h.cloud.node_pool_names(REGION, "c1").is_empty());
    assert_eq!(
        h.cloud.cluster_status(REGION, "c1"),
        Some(ClusterStatus::Deleting)
    );
}

#[tokio::test(start_paused = true)]
async fn default_node_pool_attaches_once_active() {
    let h = harness().await;
    let mut spec = spec("c1");
    spec.default_node = Some(NodeSpec::sized("default", "s"));

    h.service.create_cluster(&spec).await.unwrap();
    assert_eq!(h.cloud.calls("create_node_pool"), 0);

    h.cloud.set_cluster_status(REGION, "c1", ClusterStatus::Active);
    h.service.attach_default_node(&spec).await.unwrap();

    let pool = h.cloud.node_pool(REGION, "c1", "default").unwrap();
    assert_eq!(pool.instance_types, vec!["t3.medium".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn default_node_pool_gives_up_after_schedule() {
    let h = harness().await;
    let mut spec = spec("c1");
    spec.default_node = Some(NodeSpec::sized("default", "s"));
    h.service.create_cluster(&spec).await.unwrap();

    let err = h.service.attach_default_node(&spec).await.unwrap_err();
    assert!(matches!(
        err,
        ControlError::ActivationFailed {
            last_status: ClusterStatus::Creating,
            ..
        }
    ));
    assert_eq!(h.cloud.calls("create_node_pool"), 0);
}

#[tokio::test]
async fn unknown_provider_is_rejected() {
    let h = harness().await;
    let mut spec = spec("c1");
    spec.provider = "digitalocean".to_string();

    let err = h.service.create_cluster(&spec).await.unwrap_err();
    assert!(matches!(err, ControlError::ProviderNotFound(ref p) if p == "digitalocean"));
    assert_eq!(err.http_status_code(), 404);
    assert_eq!(h.cloud.mutation_count(), 0);
}
