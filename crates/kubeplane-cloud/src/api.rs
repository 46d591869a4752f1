//! Cloud resource provider traits.
//!
//! The API is split by concern. [`CloudApi`] bundles the three that every
//! provider must offer; block storage is optional and exposed through
//! [`CloudApi::volumes`].

use async_trait::async_trait;
use kubeplane_core::{Provider, Tags};

use crate::error::Result;
use crate::session::Session;
use crate::types::{
    CreateClusterInput, CreateNodePoolInput, CreateRoleInput, CreateVolumeInput, Gateway,
    ManagedCluster, Network, NodePool, ResourceFilter, Role, RouteTable, Snapshot, Subnet,
    Volume,
};

/// Networks, gateways, route tables and subnets.
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// List networks matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_networks(&self, session: &Session, filter: &ResourceFilter)
        -> Result<Vec<Network>>;

    /// Describe one network.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the network does not exist.
    async fn describe_network(&self, session: &Session, network_id: &str) -> Result<Network>;

    /// Allocate a network for an address block.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_network(
        &self,
        session: &Session,
        name: &str,
        cidr: &str,
        tags: &Tags,
    ) -> Result<Network>;

    /// Delete a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_network(&self, session: &Session, network_id: &str) -> Result<()>;

    /// List gateways matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_gateways(&self, session: &Session, filter: &ResourceFilter)
        -> Result<Vec<Gateway>>;

    /// Create a detached gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_gateway(&self, session: &Session, tags: &Tags) -> Result<Gateway>;

    /// Attach a gateway to a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn attach_gateway(&self, session: &Session, gateway_id: &str, network_id: &str)
        -> Result<()>;

    /// Detach a gateway from a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn detach_gateway(&self, session: &Session, gateway_id: &str, network_id: &str)
        -> Result<()>;

    /// Delete a gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_gateway(&self, session: &Session, gateway_id: &str) -> Result<()>;

    /// List the route tables of a network matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_route_tables(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<RouteTable>>;

    /// Create a route table in a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_route_table(
        &self,
        session: &Session,
        network_id: &str,
        tags: &Tags,
    ) -> Result<RouteTable>;

    /// Add a route to a route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_route(
        &self,
        session: &Session,
        route_table_id: &str,
        destination: &str,
        gateway_id: &str,
    ) -> Result<()>;

    /// Associate a route table with a subnet, returning the association ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn associate_route_table(
        &self,
        session: &Session,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String>;

    /// Remove a route table association.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn disassociate_route_table(&self, session: &Session, association_id: &str)
        -> Result<()>;

    /// Delete a route table.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_route_table(&self, session: &Session, route_table_id: &str) -> Result<()>;

    /// List the availability zones of the session's region.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_zones(&self, session: &Session) -> Result<Vec<String>>;

    /// List the subnets of a network matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_subnets(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<Subnet>>;

    /// Create a subnet in one zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_subnet(
        &self,
        session: &Session,
        network_id: &str,
        cidr: &str,
        zone: &str,
        tags: &Tags,
    ) -> Result<Subnet>;

    /// Make instances launched in a subnet get a public address.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn enable_public_ip_on_launch(&self, session: &Session, subnet_id: &str) -> Result<()>;

    /// Delete a subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_subnet(&self, session: &Session, subnet_id: &str) -> Result<()>;
}

/// Roles and policy attachments.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Look up a role by name.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if no role has this name.
    async fn get_role(&self, session: &Session, name: &str) -> Result<Role>;

    /// Create a role.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_role(&self, session: &Session, input: &CreateRoleInput) -> Result<Role>;

    /// Attach a managed policy to a role. Attaching twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn attach_role_policy(&self, session: &Session, role_name: &str, policy: &str)
        -> Result<()>;
}

/// Managed clusters and node pools.
#[async_trait]
pub trait ContainerApi: Send + Sync {
    /// List cluster names in the session's region.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_clusters(&self, session: &Session) -> Result<Vec<String>>;

    /// Describe one cluster.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the cluster does not exist.
    async fn describe_cluster(&self, session: &Session, name: &str) -> Result<ManagedCluster>;

    /// Start creating a cluster. Returns as soon as the provider accepts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_cluster(
        &self,
        session: &Session,
        input: &CreateClusterInput,
    ) -> Result<ManagedCluster>;

    /// Start deleting a cluster.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::Conflict` if node pools are still attached.
    async fn delete_cluster(&self, session: &Session, name: &str) -> Result<()>;

    /// Fetch a kubeconfig document for a cluster's API server.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn cluster_kubeconfig(&self, session: &Session, name: &str) -> Result<String>;

    /// List node pool names of a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn list_node_pools(&self, session: &Session, cluster: &str) -> Result<Vec<String>>;

    /// Describe one node pool.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the pool does not exist.
    async fn describe_node_pool(
        &self,
        session: &Session,
        cluster: &str,
        pool: &str,
    ) -> Result<NodePool>;

    /// Start creating a node pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_node_pool(
        &self,
        session: &Session,
        input: &CreateNodePoolInput,
    ) -> Result<NodePool>;

    /// Start deleting a node pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_node_pool(&self, session: &Session, cluster: &str, pool: &str) -> Result<()>;
}

/// Block storage volumes and snapshots.
#[async_trait]
pub trait VolumeApi: Send + Sync {
    /// Create a volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_volume(&self, session: &Session, input: &CreateVolumeInput) -> Result<Volume>;

    /// Delete a volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn delete_volume(&self, session: &Session, volume_id: &str) -> Result<()>;

    /// Start a snapshot of a volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails.
    async fn create_snapshot(&self, session: &Session, volume_id: &str, tags: &Tags)
        -> Result<Snapshot>;

    /// Describe a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CloudError::NotFound` if the snapshot does not exist.
    async fn describe_snapshot(&self, session: &Session, snapshot_id: &str) -> Result<Snapshot>;
}

/// Everything the control plane needs from one provider.
pub trait CloudApi: NetworkApi + IdentityApi + ContainerApi {
    /// The provider behind this API.
    fn provider(&self) -> Provider;

    /// Block storage, if this provider's adapter exposes it.
    fn volumes(&self) -> Option<&dyn VolumeApi> {
        None
    }
}
