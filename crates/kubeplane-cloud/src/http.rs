//! HTTP adapter for a per-provider cloud broker.
//!
//! Each provider is fronted by a broker service that exposes the cloud's
//! resource API as JSON over HTTP under `/v1/regions/{region}/...`. The
//! session's credential is sent as basic auth, the account and session ID as
//! headers.

use std::time::Duration;

use async_trait::async_trait;
use kubeplane_core::{Provider, Tags};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{CloudApi, ContainerApi, IdentityApi, NetworkApi, VolumeApi};
use crate::error::{CloudError, Result};
use crate::session::Session;
use crate::types::{
    CreateClusterInput, CreateNodePoolInput, CreateRoleInput, CreateVolumeInput, Gateway,
    ManagedCluster, Network, NodePool, ResourceFilter, Role, RouteTable, Snapshot, Subnet,
    Volume,
};

/// Header carrying the account the session is bound to.
pub const ACCOUNT_HEADER: &str = "x-kubeplane-account";
/// Header carrying the session ID.
pub const SESSION_HEADER: &str = "x-kubeplane-session";

/// Cloud API client speaking to a provider broker.
#[derive(Debug, Clone)]
pub struct HttpCloudApi {
    client: reqwest::Client,
    provider: Provider,
    base_url: String,
    volumes_enabled: bool,
}

impl HttpCloudApi {
    /// Create a client for one provider's broker.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Transport` if the HTTP client cannot be built.
    pub fn new(provider: Provider, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CloudError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, provider, base_url))
    }

    /// Create a client with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        provider: Provider,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            volumes_enabled: false,
        }
    }

    /// Expose the broker's block storage endpoints.
    #[must_use]
    pub const fn with_volumes(mut self) -> Self {
        self.volumes_enabled = true;
        self
    }

    /// Get the base URL of the broker.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, session: &Session, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/regions/{}/{path}", self.base_url, session.region());
        self.client
            .request(method, url)
            .basic_auth(session.access_key(), Some(session.secret_key()))
            .header(ACCOUNT_HEADER, session.account())
            .header(SESSION_HEADER, session.id().to_string())
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| CloudError::Transport(format!("{} broker request failed: {e}", self.provider)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CloudError::not_found(kind, id));
        }

        let (code, message) = response
            .json::<ErrorResponse>()
            .await
            .map(|e| (e.error.code, e.error.message))
            .unwrap_or_else(|_| (status.as_u16().to_string(), format!("broker returned status {status}")));

        tracing::debug!(
            provider = %self.provider,
            kind,
            id,
            status = %status,
            code = %code,
            "Broker rejected request"
        );

        if status == StatusCode::CONFLICT {
            Err(CloudError::Conflict(message))
        } else {
            Err(CloudError::Api { code, message })
        }
    }

    async fn json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<T> {
        self.execute(builder, kind, id)
            .await?
            .json::<T>()
            .await
            .map_err(|e| CloudError::Transport(format!("failed to parse response: {e}")))
    }

    async fn empty(
        &self,
        builder: reqwest::RequestBuilder,
        kind: &'static str,
        id: &str,
    ) -> Result<()> {
        self.execute(builder, kind, id).await.map(|_| ())
    }
}

/// Query string for a resource filter: `name=..` and one `tag=key=value` per tag.
fn filter_query(filter: &ResourceFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(filter.tags.len() + 1);
    if let Some(name) = &filter.name {
        query.push(("name", name.clone()));
    }
    for (key, value) in &filter.tags {
        query.push(("tag", format!("{key}={value}")));
    }
    query
}

/// Error response from a broker.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Serialize)]
struct CreateNetworkRequest<'a> {
    name: &'a str,
    cidr: &'a str,
    tags: &'a Tags,
}

#[derive(Serialize)]
struct TagsRequest<'a> {
    tags: &'a Tags,
}

#[derive(Serialize)]
struct AttachGatewayRequest<'a> {
    network_id: &'a str,
}

#[derive(Serialize)]
struct CreateRouteRequest<'a> {
    destination: &'a str,
    gateway_id: &'a str,
}

#[derive(Serialize)]
struct AssociateRequest<'a> {
    subnet_id: &'a str,
}

#[derive(Deserialize)]
struct AssociationResponse {
    association_id: String,
}

#[derive(Serialize)]
struct CreateSubnetRequest<'a> {
    cidr: &'a str,
    zone: &'a str,
    tags: &'a Tags,
}

#[derive(Serialize)]
struct AttachPolicyRequest<'a> {
    policy: &'a str,
}

#[derive(Serialize)]
struct CreateSnapshotRequest<'a> {
    volume_id: &'a str,
    tags: &'a Tags,
}

#[derive(Deserialize)]
struct KubeconfigResponse {
    kubeconfig: String,
}

#[async_trait]
impl NetworkApi for HttpCloudApi {
    async fn list_networks(
        &self,
        session: &Session,
        filter: &ResourceFilter,
    ) -> Result<Vec<Network>> {
        let req = self
            .request(session, Method::GET, "networks")
            .query(&filter_query(filter));
        self.json(req, "network", "*").await
    }

    async fn describe_network(&self, session: &Session, network_id: &str) -> Result<Network> {
        let req = self.request(session, Method::GET, &format!("networks/{network_id}"));
        self.json(req, "network", network_id).await
    }

    async fn create_network(
        &self,
        session: &Session,
        name: &str,
        cidr: &str,
        tags: &Tags,
    ) -> Result<Network> {
        let req = self
            .request(session, Method::POST, "networks")
            .json(&CreateNetworkRequest { name, cidr, tags });
        self.json(req, "network", name).await
    }

    async fn delete_network(&self, session: &Session, network_id: &str) -> Result<()> {
        let req = self.request(session, Method::DELETE, &format!("networks/{network_id}"));
        self.empty(req, "network", network_id).await
    }

    async fn list_gateways(
        &self,
        session: &Session,
        filter: &ResourceFilter,
    ) -> Result<Vec<Gateway>> {
        let req = self
            .request(session, Method::GET, "gateways")
            .query(&filter_query(filter));
        self.json(req, "gateway", "*").await
    }

    async fn create_gateway(&self, session: &Session, tags: &Tags) -> Result<Gateway> {
        let req = self
            .request(session, Method::POST, "gateways")
            .json(&TagsRequest { tags });
        self.json(req, "gateway", "new").await
    }

    async fn attach_gateway(
        &self,
        session: &Session,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<()> {
        let req = self
            .request(session, Method::POST, &format!("gateways/{gateway_id}/attach"))
            .json(&AttachGatewayRequest { network_id });
        self.empty(req, "gateway", gateway_id).await
    }

    async fn detach_gateway(
        &self,
        session: &Session,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<()> {
        let req = self
            .request(session, Method::POST, &format!("gateways/{gateway_id}/detach"))
            .json(&AttachGatewayRequest { network_id });
        self.empty(req, "gateway", gateway_id).await
    }

    async fn delete_gateway(&self, session: &Session, gateway_id: &str) -> Result<()> {
        let req = self.request(session, Method::DELETE, &format!("gateways/{gateway_id}"));
        self.empty(req, "gateway", gateway_id).await
    }

    async fn list_route_tables(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<RouteTable>> {
        let req = self
            .request(session, Method::GET, &format!("networks/{network_id}/route-tables"))
            .query(&filter_query(filter));
        self.json(req, "network", network_id).await
    }

    async fn create_route_table(
        &self,
        session: &Session,
        network_id: &str,
        tags: &Tags,
    ) -> Result<RouteTable> {
        let req = self
            .request(session, Method::POST, &format!("networks/{network_id}/route-tables"))
            .json(&TagsRequest { tags });
        self.json(req, "network", network_id).await
    }

    async fn create_route(
        &self,
        session: &Session,
        route_table_id: &str,
        destination: &str,
        gateway_id: &str,
    ) -> Result<()> {
        let req = self
            .request(session, Method::POST, &format!("route-tables/{route_table_id}/routes"))
            .json(&CreateRouteRequest {
                destination,
                gateway_id,
            });
        self.empty(req, "route table", route_table_id).await
    }

    async fn associate_route_table(
        &self,
        session: &Session,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String> {
        let req = self
            .request(
                session,
                Method::POST,
                &format!("route-tables/{route_table_id}/associations"),
            )
            .json(&AssociateRequest { subnet_id });
        let response: AssociationResponse = self.json(req, "route table", route_table_id).await?;
        Ok(response.association_id)
    }

    async fn disassociate_route_table(&self, session: &Session, association_id: &str) -> Result<()> {
        let req = self.request(
            session,
            Method::DELETE,
            &format!("route-table-associations/{association_id}"),
        );
        self.empty(req, "route table association", association_id)
            .await
    }

    async fn delete_route_table(&self, session: &Session, route_table_id: &str) -> Result<()> {
        let req = self.request(
            session,
            Method::DELETE,
            &format!("route-tables/{route_table_id}"),
        );
        self.empty(req, "route table", route_table_id).await
    }

    async fn list_zones(&self, session: &Session) -> Result<Vec<String>> {
        let req = self.request(session, Method::GET, "zones");
        self.json(req, "region", session.region()).await
    }

    async fn list_subnets(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<Subnet>> {
        let req = self
            .request(session, Method::GET, &format!("networks/{network_id}/subnets"))
            .query(&filter_query(filter));
        self.json(req, "network", network_id).await
    }

    async fn create_subnet(
        &self,
        session: &Session,
        network_id: &str,
        cidr: &str,
        zone: &str,
        tags: &Tags,
    ) -> Result<Subnet> {
        let req = self
            .request(session, Method::POST, &format!("networks/{network_id}/subnets"))
            .json(&CreateSubnetRequest { cidr, zone, tags });
        self.json(req, "network", network_id).await
    }

    async fn enable_public_ip_on_launch(&self, session: &Session, subnet_id: &str) -> Result<()> {
        let req = self.request(
            session,
            Method::POST,
            &format!("subnets/{subnet_id}/map-public-ip"),
        );
        self.empty(req, "subnet", subnet_id).await
    }

    async fn delete_subnet(&self, session: &Session, subnet_id: &str) -> Result<()> {
        let req = self.request(session, Method::DELETE, &format!("subnets/{subnet_id}"));
        self.empty(req, "subnet", subnet_id).await
    }
}

#[async_trait]
impl IdentityApi for HttpCloudApi {
    async fn get_role(&self, session: &Session, name: &str) -> Result<Role> {
        let req = self.request(session, Method::GET, &format!("roles/{name}"));
        self.json(req, "role", name).await
    }

    async fn create_role(&self, session: &Session, input: &CreateRoleInput) -> Result<Role> {
        let req = self.request(session, Method::POST, "roles").json(input);
        self.json(req, "role", &input.name).await
    }

    async fn attach_role_policy(
        &self,
        session: &Session,
        role_name: &str,
        policy: &str,
    ) -> Result<()> {
        let req = self
            .request(session, Method::POST, &format!("roles/{role_name}/policies"))
            .json(&AttachPolicyRequest { policy });
        self.empty(req, "role", role_name).await
    }
}

#[async_trait]
impl ContainerApi for HttpCloudApi {
    async fn list_clusters(&self, session: &Session) -> Result<Vec<String>> {
        let req = self.request(session, Method::GET, "clusters");
        self.json(req, "region", session.region()).await
    }

    async fn describe_cluster(&self, session: &Session, name: &str) -> Result<ManagedCluster> {
        let req = self.request(session, Method::GET, &format!("clusters/{name}"));
        self.json(req, "cluster", name).await
    }

    async fn create_cluster(
        &self,
        session: &Session,
        input: &CreateClusterInput,
    ) -> Result<ManagedCluster> {
        let req = self.request(session, Method::POST, "clusters").json(input);
        let cluster: ManagedCluster = self.json(req, "cluster", &input.name).await?;
        tracing::debug!(
            provider = %self.provider,
            session = %session.id(),
            cluster = %cluster.name,
            "Broker accepted cluster create"
        );
        Ok(cluster)
    }

    async fn delete_cluster(&self, session: &Session, name: &str) -> Result<()> {
        let req = self.request(session, Method::DELETE, &format!("clusters/{name}"));
        self.empty(req, "cluster", name).await
    }

    async fn cluster_kubeconfig(&self, session: &Session, name: &str) -> Result<String> {
        let req = self.request(session, Method::GET, &format!("clusters/{name}/kubeconfig"));
        let response: KubeconfigResponse = self.json(req, "cluster", name).await?;
        Ok(response.kubeconfig)
    }

    async fn list_node_pools(&self, session: &Session, cluster: &str) -> Result<Vec<String>> {
        let req = self.request(session, Method::GET, &format!("clusters/{cluster}/nodepools"));
        self.json(req, "cluster", cluster).await
    }

    async fn describe_node_pool(
        &self,
        session: &Session,
        cluster: &str,
        pool: &str,
    ) -> Result<NodePool> {
        let req = self.request(
            session,
            Method::GET,
            &format!("clusters/{cluster}/nodepools/{pool}"),
        );
        self.json(req, "nodegroup", pool).await
    }

    async fn create_node_pool(
        &self,
        session: &Session,
        input: &CreateNodePoolInput,
    ) -> Result<NodePool> {
        let req = self
            .request(
                session,
                Method::POST,
                &format!("clusters/{}/nodepools", input.cluster),
            )
            .json(input);
        self.json(req, "cluster", &input.cluster).await
    }

    async fn delete_node_pool(&self, session: &Session, cluster: &str, pool: &str) -> Result<()> {
        let req = self.request(
            session,
            Method::DELETE,
            &format!("clusters/{cluster}/nodepools/{pool}"),
        );
        self.empty(req, "nodegroup", pool).await
    }
}

#[async_trait]
impl VolumeApi for HttpCloudApi {
    async fn create_volume(&self, session: &Session, input: &CreateVolumeInput) -> Result<Volume> {
        let req = self.request(session, Method::POST, "volumes").json(input);
        self.json(req, "zone", &input.zone).await
    }

    async fn delete_volume(&self, session: &Session, volume_id: &str) -> Result<()> {
        let req = self.request(session, Method::DELETE, &format!("volumes/{volume_id}"));
        self.empty(req, "volume", volume_id).await
    }

    async fn create_snapshot(
        &self,
        session: &Session,
        volume_id: &str,
        tags: &Tags,
    ) -> Result<Snapshot> {
        let req = self
            .request(session, Method::POST, "snapshots")
            .json(&CreateSnapshotRequest { volume_id, tags });
        self.json(req, "volume", volume_id).await
    }

    async fn describe_snapshot(&self, session: &Session, snapshot_id: &str) -> Result<Snapshot> {
        let req = self.request(session, Method::GET, &format!("snapshots/{snapshot_id}"));
        self.json(req, "snapshot", snapshot_id).await
    }
}

impl CloudApi for HttpCloudApi {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn volumes(&self) -> Option<&dyn VolumeApi> {
        if self.volumes_enabled {
            Some(self)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = HttpCloudApi::new(Provider::Aws, "http://broker:8080/").unwrap();
        assert_eq!(api.base_url(), "http://broker:8080");
        assert!(api.volumes().is_none());
        assert!(api.with_volumes().volumes().is_some());
    }

    #[test]
    fn filter_query_encodes_name_and_tags() {
        let mut tags = Tags::new();
        tags.insert("owner".into(), "kp".into());
        let query = filter_query(&ResourceFilter::named("net", tags));
        assert_eq!(
            query,
            vec![("name", "net".to_string()), ("tag", "owner=kp".to_string())]
        );
    }
}
