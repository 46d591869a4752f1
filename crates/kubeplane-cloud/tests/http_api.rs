//! Broker adapter tests against a local HTTP double.

use chrono::Duration;
use kubeplane_cloud::{
    ClusterStatus, CloudError, ContainerApi, HttpCloudApi, IdentityApi, NetworkApi,
    ResourceFilter, Session,
};
use kubeplane_core::{Provider, Tags};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session() -> Session {
    Session::new(
        Provider::Aws,
        "us-east-1",
        "123456789012",
        "AKIA",
        "secret",
        Duration::minutes(15),
    )
}

#[tokio::test]
async fn describe_cluster_parses_body_and_sends_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/regions/us-east-1/clusters/c1"))
        .and(header("x-kubeplane-account", "123456789012"))
        .and(header_exists("x-kubeplane-session"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "c1",
            "id": "arn:c1",
            "status": "ACTIVE",
            "role_id": "role/kubeplane-cluster-role",
            "subnet_ids": ["subnet-1"],
            "tags": {"kubeplane.io/scope": "prod"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpCloudApi::new(Provider::Aws, server.uri()).unwrap();
    let cluster = api.describe_cluster(&session(), "c1").await.unwrap();

    assert_eq!(cluster.status, ClusterStatus::Active);
    assert_eq!(cluster.subnet_ids, vec!["subnet-1"]);
    assert_eq!(
        cluster.tags.get("kubeplane.io/scope").map(String::as_str),
        Some("prod")
    );
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/regions/us-east-1/roles/kubeplane-node-role"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let api = HttpCloudApi::new(Provider::Aws, server.uri()).unwrap();
    let err = api
        .get_role(&session(), "kubeplane-node-role")
        .await
        .unwrap_err();

    assert_eq!(err, CloudError::not_found("role", "kubeplane-node-role"));
}

#[tokio::test]
async fn conflict_and_provider_errors_keep_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/regions/us-east-1/clusters/c1"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {"code": "ResourceInUse", "message": "Cluster has nodegroups attached"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/regions/us-east-1/gateways"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "LimitExceeded", "message": "too many gateways"}
        })))
        .mount(&server)
        .await;

    let api = HttpCloudApi::new(Provider::Aws, server.uri()).unwrap();

    let err = api.delete_cluster(&session(), "c1").await.unwrap_err();
    assert_eq!(
        err,
        CloudError::Conflict("Cluster has nodegroups attached".into())
    );

    let err = api.create_gateway(&session(), &Tags::new()).await.unwrap_err();
    assert_eq!(
        err,
        CloudError::Api {
            code: "LimitExceeded".into(),
            message: "too many gateways".into()
        }
    );
}

#[tokio::test]
async fn list_networks_sends_filter_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/regions/us-east-1/networks"))
        .and(query_param("name", "kubeplane-us-east-1-network"))
        .and(query_param("tag", "kubeplane.io/scope=prod"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": "vpc-1",
            "name": "kubeplane-us-east-1-network",
            "cidr": "192.168.0.0/16",
            "state": "available"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let mut tags = Tags::new();
    tags.insert("kubeplane.io/scope".into(), "prod".into());
    let filter = ResourceFilter::named("kubeplane-us-east-1-network", tags);

    let api = HttpCloudApi::new(Provider::Aws, server.uri()).unwrap();
    let networks = api.list_networks(&session(), &filter).await.unwrap();

    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].id, "vpc-1");
}

#[tokio::test]
async fn unreachable_broker_is_a_transport_error() {
    let api = HttpCloudApi::new(Provider::Aws, "http://127.0.0.1:1").unwrap();
    let err = api.list_clusters(&session()).await.unwrap_err();
    assert!(matches!(err, CloudError::Transport(_)));
    assert!(err.is_retriable());
}
