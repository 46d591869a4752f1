//! Gateway route tests against the in-memory cloud.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};

use kubeplane_cloud::{CloudApi, ClusterStatus, MockCloud};
use kubeplane_control::{
    ClusterService, ControlConfig, ProviderRegistry, SessionResolver,
};
use kubeplane_core::Provider;
use kubeplane_gateway::{create_router, GatewayConfig, GatewayState};
use kubeplane_nodes::{ClusterApi, MockClusterApi};
use kubeplane_store::RocksSecretStore;

const REGION: &str = "us-east-1";
const ACCOUNT: &str = "123456789012";

struct Harness {
    cloud: Arc<MockCloud>,
    server: TestServer,
    _data_dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let data_dir = tempfile::tempdir().unwrap();
    let cloud = Arc::new(MockCloud::new(Provider::Aws));
    let config = Arc::new(ControlConfig::default());
    let secrets = Arc::new(RocksSecretStore::open(data_dir.path()).unwrap());
    let resolver = Arc::new(SessionResolver::new(Arc::clone(&config), secrets));
    let nodes: Arc<dyn ClusterApi> = Arc::new(MockClusterApi::new());
    let apis: Vec<Arc<dyn CloudApi>> = vec![cloud.clone()];

    let service = Arc::new(ClusterService::with_defaults(ProviderRegistry::managed(
        apis, &nodes, &resolver, &config,
    )));
    let app = create_router(GatewayState::new(service, GatewayConfig::default()));

    Harness {
        cloud,
        server: TestServer::new(app).unwrap(),
        _data_dir: data_dir,
    }
}

fn cluster_body(name: &str) -> Value {
    json!({
        "name": name,
        "provider": "aws",
        "region": REGION,
        "account": ACCOUNT,
    })
}

async fn store_credential(h: &Harness) {
    h.server
        .put(&format!("/v1/credentials/aws/{ACCOUNT}"))
        .json(&json!({"key_id": "AKIA", "secret": "secret"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn health_lists_registered_providers() {
    let h = harness();
    let response = h.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["providers"], json!(["aws"]));
}

#[tokio::test]
async fn create_requires_a_stored_credential() {
    let h = harness();

    let response = h.server.post("/v1/clusters").json(&cluster_body("c1")).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "not_found");

    store_credential(&h).await;
    let response = h.server.post("/v1/clusters").json(&cluster_body("c1")).await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["cluster_name"], "c1");
    assert_eq!(body["status"], "CREATING");

    let response = h.server.post("/v1/clusters").json(&cluster_body("c1")).await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn empty_credential_is_rejected() {
    let h = harness();
    let response = h
        .server
        .put(&format!("/v1/credentials/aws/{ACCOUNT}"))
        .json(&json!({"key_id": "AKIA", "secret": ""}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn clusters_are_listed_and_described() {
    let h = harness();
    store_credential(&h).await;
    h.server
        .post("/v1/clusters")
        .json(&cluster_body("c1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let response = h
        .server
        .get("/v1/clusters/aws")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["clusters"].as_array().map(Vec::len), Some(1));

    let response = h
        .server
        .get("/v1/clusters/aws/c1/status")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await;
    let body: Value = response.json();
    assert_eq!(body["status"], "CREATING");

    let response = h
        .server
        .get("/v1/clusters/aws/missing")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = h
        .server
        .get("/v1/clusters/digitalocean")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn node_pools_follow_cluster_state() {
    let h = harness();
    store_credential(&h).await;
    h.server
        .post("/v1/clusters")
        .json(&cluster_body("c1"))
        .await
        .assert_status(StatusCode::ACCEPTED);
    let pool = json!({"name": "default", "machine_size": "m"});

    h.server
        .post("/v1/clusters/aws/c1/nodepools")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .json(&pool)
        .await
        .assert_status(StatusCode::CONFLICT);

    h.cloud.set_cluster_status(REGION, "c1", ClusterStatus::Active);
    h.server
        .post("/v1/clusters/aws/c1/nodepools")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .json(&pool)
        .await
        .assert_status(StatusCode::ACCEPTED);

    h.server
        .delete("/v1/clusters/aws/c1")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await
        .assert_status(StatusCode::CONFLICT);

    h.server
        .delete("/v1/clusters/aws/c1/nodepools/default")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn volumes_snapshot_and_cost() {
    let h = harness();
    store_credential(&h).await;

    let response = h
        .server
        .post("/v1/volumes/aws")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .json(&json!({"zone": "us-east-1a", "size_gb": 10}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let volume: Value = response.json();
    let volume_id = volume["id"].as_str().unwrap().to_string();
    assert_eq!(volume["volume_type"], "gp3");

    h.server
        .post(&format!("/v1/volumes/aws/{volume_id}/snapshots"))
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .add_query_param("delete_volume", true)
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(h.cloud.volume_count(), 0);

    let response = h
        .server
        .get("/v1/costs/aws")
        .add_query_param("region", REGION)
        .add_query_param("account", ACCOUNT)
        .add_query_param("start", "2026-01-01T00:00:00Z")
        .add_query_param("end", "2026-02-01T00:00:00Z")
        .await;
    response.assert_status(StatusCode::NOT_IMPLEMENTED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "not_implemented");
}
