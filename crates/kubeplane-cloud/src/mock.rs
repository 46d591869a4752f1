//! In-memory cloud for tests.
//!
//! [`MockCloud`] keeps every resource in memory, scoped by the session's
//! region, and counts each call by operation name so tests can assert
//! exactly which provider mutations a flow performed. Any operation can be
//! made to fail with [`MockCloud::fail_on`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use kubeplane_core::tags::NAME_KEY;
use kubeplane_core::{Provider, Tags};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::api::{CloudApi, ContainerApi, IdentityApi, NetworkApi, VolumeApi};
use crate::error::{CloudError, Result};
use crate::session::Session;
use crate::types::{
    ClusterStatus, CreateClusterInput, CreateNodePoolInput, CreateRoleInput, CreateVolumeInput,
    Gateway, ManagedCluster, Network, NetworkState, NodePool, NodePoolStatus, ResourceFilter,
    Role, Route, RouteTable, RouteTableAssociation, Snapshot, SnapshotState, Subnet, Volume,
    VolumeState,
};

/// How a node pool behaves once deletion has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deletion {
    /// Disappears once the instant has passed.
    At(Instant),
    /// Stays in `DELETING` forever.
    Never,
    /// Moves to `DELETE_FAILED`.
    Fail,
}

/// An injected failure: calls past the first `after` fail with `error`.
#[derive(Debug, Clone)]
struct Failure {
    after: usize,
    error: CloudError,
}

#[derive(Debug, Clone)]
struct Regional<T> {
    region: String,
    value: T,
}

#[derive(Debug, Clone)]
struct MockPool {
    pool: NodePool,
    deletion: Option<Deletion>,
}

#[derive(Default)]
struct State {
    networks: BTreeMap<String, Regional<Network>>,
    gateways: BTreeMap<String, Regional<Gateway>>,
    route_tables: BTreeMap<String, Regional<RouteTable>>,
    subnets: BTreeMap<String, Regional<Subnet>>,
    roles: BTreeMap<String, Role>,
    clusters: BTreeMap<(String, String), ManagedCluster>,
    node_pools: BTreeMap<(String, String, String), MockPool>,
    volumes: BTreeMap<String, Volume>,
    snapshots: BTreeMap<String, Snapshot>,
    calls: HashMap<String, usize>,
    failures: HashMap<String, Failure>,
    zones: Option<Vec<String>>,
    pool_delete_delay: Duration,
    stuck_pools: BTreeSet<String>,
    failing_pools: BTreeSet<String>,
}

/// A cloud that exists only in memory.
pub struct MockCloud {
    provider: Provider,
    volumes_enabled: bool,
    state: Mutex<State>,
}

fn new_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &uuid[..12])
}

impl MockCloud {
    /// Create an empty mock cloud for one provider.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            volumes_enabled: provider == Provider::Aws,
            state: Mutex::new(State::default()),
        }
    }

    /// Use a fixed zone list instead of `{region}a` through `{region}d`.
    #[must_use]
    pub fn with_zones(self, zones: &[&str]) -> Self {
        self.set_zones(zones);
        self
    }

    /// Replace the zones every region reports.
    pub fn set_zones(&self, zones: &[&str]) {
        self.state.lock().zones = Some(zones.iter().map(|z| (*z).to_string()).collect());
    }

    /// Make every call to `operation` fail with `error` until cleared.
    pub fn fail_on(&self, operation: &str, error: CloudError) {
        self.fail_after(operation, 0, error);
    }

    /// Let the next `successes` calls to `operation` succeed, then fail.
    pub fn fail_after(&self, operation: &str, successes: usize, error: CloudError) {
        let mut state = self.state.lock();
        let after = state.calls.get(operation).copied().unwrap_or(0) + successes;
        state
            .failures
            .insert(operation.to_string(), Failure { after, error });
    }

    /// Stop failing calls to `operation`.
    pub fn clear_failure(&self, operation: &str) {
        self.state.lock().failures.remove(operation);
    }

    /// Number of times `operation` was called, including failed calls.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Total number of calls to mutating operations.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(op, _)| !is_read_only(op))
            .map(|(_, n)| n)
            .sum()
    }

    /// How long a node pool takes to disappear after its delete call.
    pub fn set_node_pool_delete_delay(&self, delay: Duration) {
        self.state.lock().pool_delete_delay = delay;
    }

    /// Make a node pool's deletion never finish.
    pub fn hang_node_pool_deletion(&self, pool: &str) {
        self.state.lock().stuck_pools.insert(pool.to_string());
    }

    /// Make a node pool's deletion end in `DELETE_FAILED`.
    pub fn fail_node_pool_deletion(&self, pool: &str) {
        self.state.lock().failing_pools.insert(pool.to_string());
    }

    /// Force a cluster's status.
    pub fn set_cluster_status(&self, region: &str, name: &str, status: ClusterStatus) {
        if let Some(cluster) = self
            .state
            .lock()
            .clusters
            .get_mut(&(region.to_string(), name.to_string()))
        {
            cluster.status = status;
        }
    }

    /// Insert a cluster directly, bypassing call accounting.
    pub fn insert_cluster(&self, region: &str, cluster: ManagedCluster) {
        self.state
            .lock()
            .clusters
            .insert((region.to_string(), cluster.name.clone()), cluster);
    }

    /// Insert a node pool directly, bypassing call accounting.
    pub fn insert_node_pool(&self, region: &str, pool: NodePool) {
        self.state.lock().node_pools.insert(
            (region.to_string(), pool.cluster.clone(), pool.name.clone()),
            MockPool {
                pool,
                deletion: None,
            },
        );
    }

    /// Insert a role directly, bypassing call accounting.
    pub fn insert_role(&self, role: Role) {
        self.state.lock().roles.insert(role.name.clone(), role);
    }

    /// Current status of a cluster.
    #[must_use]
    pub fn cluster_status(&self, region: &str, name: &str) -> Option<ClusterStatus> {
        self.state
            .lock()
            .clusters
            .get(&(region.to_string(), name.to_string()))
            .map(|c| c.status)
    }

    /// Names of the node pools of a cluster that still exist.
    #[must_use]
    pub fn node_pool_names(&self, region: &str, cluster: &str) -> Vec<String> {
        self.state
            .lock()
            .node_pools
            .keys()
            .filter(|(r, c, _)| r == region && c == cluster)
            .map(|(_, _, p)| p.clone())
            .collect()
    }

    /// A node pool as the provider currently sees it.
    #[must_use]
    pub fn node_pool(&self, region: &str, cluster: &str, pool: &str) -> Option<NodePool> {
        self.state
            .lock()
            .node_pools
            .get(&(region.to_string(), cluster.to_string(), pool.to_string()))
            .map(|p| p.pool.clone())
    }

    /// A role by name.
    #[must_use]
    pub fn role(&self, name: &str) -> Option<Role> {
        self.state.lock().roles.get(name).cloned()
    }

    /// Number of networks.
    #[must_use]
    pub fn network_count(&self) -> usize {
        self.state.lock().networks.len()
    }

    /// Number of gateways.
    #[must_use]
    pub fn gateway_count(&self) -> usize {
        self.state.lock().gateways.len()
    }

    /// Number of route tables, excluding main tables.
    #[must_use]
    pub fn route_table_count(&self) -> usize {
        self.state
            .lock()
            .route_tables
            .values()
            .filter(|t| !t.value.main)
            .count()
    }

    /// Number of subnets.
    #[must_use]
    pub fn subnet_count(&self) -> usize {
        self.state.lock().subnets.len()
    }

    /// Subnets in creation order of their IDs, for inspection.
    #[must_use]
    pub fn subnets(&self) -> Vec<Subnet> {
        self.state
            .lock()
            .subnets
            .values()
            .map(|s| s.value.clone())
            .collect()
    }

    /// Number of clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.state.lock().clusters.len()
    }

    /// Number of volumes.
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.state.lock().volumes.len()
    }

    /// Record a call and return the injected failure, if any.
    fn enter(&self, operation: &str) -> Result<parking_lot::MutexGuard<'_, State>> {
        let mut state = self.state.lock();
        let count = state.calls.entry(operation.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        if let Some(failure) = state.failures.get(operation) {
            if count > failure.after {
                return Err(failure.error.clone());
            }
        }
        Ok(state)
    }
}

fn is_read_only(operation: &str) -> bool {
    operation.starts_with("list_")
        || operation.starts_with("describe_")
        || operation.starts_with("get_")
        || operation == "cluster_kubeconfig"
}

fn in_region<'a, T>(
    map: &'a BTreeMap<String, Regional<T>>,
    session: &'a Session,
) -> impl Iterator<Item = &'a T> + 'a {
    map.values()
        .filter(move |r| r.region == session.region())
        .map(|r| &r.value)
}

fn get_regional<'a, T>(
    map: &'a mut BTreeMap<String, Regional<T>>,
    session: &Session,
    kind: &'static str,
    id: &str,
) -> Result<&'a mut T> {
    map.get_mut(id)
        .filter(|r| r.region == session.region())
        .map(|r| &mut r.value)
        .ok_or_else(|| CloudError::not_found(kind, id))
}

fn name_tag(tags: &Tags) -> Option<&str> {
    tags.get(NAME_KEY).map(String::as_str)
}

fn key(session: &Session, name: &str) -> (String, String) {
    (session.region().to_string(), name.to_string())
}

fn pool_key(session: &Session, cluster: &str, pool: &str) -> (String, String, String) {
    (
        session.region().to_string(),
        cluster.to_string(),
        pool.to_string(),
    )
}

#[async_trait]
impl NetworkApi for MockCloud {
    async fn list_networks(
        &self,
        session: &Session,
        filter: &ResourceFilter,
    ) -> Result<Vec<Network>> {
        let state = self.enter("list_networks")?;
        Ok(in_region(&state.networks, session)
            .filter(|n| filter.matches(Some(&n.name), &n.tags))
            .cloned()
            .collect())
    }

    async fn describe_network(&self, session: &Session, network_id: &str) -> Result<Network> {
        let mut state = self.enter("describe_network")?;
        let network = get_regional(&mut state.networks, session, "network", network_id)?;
        network.state = NetworkState::Available;
        Ok(network.clone())
    }

    async fn create_network(
        &self,
        session: &Session,
        name: &str,
        cidr: &str,
        tags: &Tags,
    ) -> Result<Network> {
        let mut state = self.enter("create_network")?;
        let network = Network {
            id: new_id("net"),
            name: name.to_string(),
            cidr: cidr.to_string(),
            state: NetworkState::Pending,
            tags: tags.clone(),
        };
        let main = RouteTable {
            id: new_id("rtb"),
            network_id: network.id.clone(),
            main: true,
            routes: Vec::new(),
            associations: Vec::new(),
            tags: Tags::new(),
        };
        let region = session.region().to_string();
        state.route_tables.insert(
            main.id.clone(),
            Regional {
                region: region.clone(),
                value: main,
            },
        );
        state.networks.insert(
            network.id.clone(),
            Regional {
                region,
                value: network.clone(),
            },
        );
        Ok(network)
    }

    async fn delete_network(&self, session: &Session, network_id: &str) -> Result<()> {
        let mut state = self.enter("delete_network")?;
        get_regional(&mut state.networks, session, "network", network_id)?;

        let has_subnets = state.subnets.values().any(|s| s.value.network_id == network_id);
        let has_gateway = state
            .gateways
            .values()
            .any(|g| g.value.network_id.as_deref() == Some(network_id));
        let has_tables = state
            .route_tables
            .values()
            .any(|t| t.value.network_id == network_id && !t.value.main);
        if has_subnets || has_gateway || has_tables {
            return Err(CloudError::Conflict(format!(
                "network {network_id} has dependencies and cannot be deleted"
            )));
        }

        state
            .route_tables
            .retain(|_, t| t.value.network_id != network_id);
        state.networks.remove(network_id);
        Ok(())
    }

    async fn list_gateways(
        &self,
        session: &Session,
        filter: &ResourceFilter,
    ) -> Result<Vec<Gateway>> {
        let state = self.enter("list_gateways")?;
        Ok(in_region(&state.gateways, session)
            .filter(|g| filter.matches(name_tag(&g.tags), &g.tags))
            .cloned()
            .collect())
    }

    async fn create_gateway(&self, session: &Session, tags: &Tags) -> Result<Gateway> {
        let mut state = self.enter("create_gateway")?;
        let gateway = Gateway {
            id: new_id("igw"),
            network_id: None,
            tags: tags.clone(),
        };
        state.gateways.insert(
            gateway.id.clone(),
            Regional {
                region: session.region().to_string(),
                value: gateway.clone(),
            },
        );
        Ok(gateway)
    }

    async fn attach_gateway(
        &self,
        session: &Session,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("attach_gateway")?;
        get_regional(&mut state.networks, session, "network", network_id)?;
        let gateway = get_regional(&mut state.gateways, session, "gateway", gateway_id)?;
        if gateway.network_id.is_some() {
            return Err(CloudError::Conflict(format!(
                "gateway {gateway_id} is already attached"
            )));
        }
        gateway.network_id = Some(network_id.to_string());
        Ok(())
    }

    async fn detach_gateway(
        &self,
        session: &Session,
        gateway_id: &str,
        network_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("detach_gateway")?;
        let gateway = get_regional(&mut state.gateways, session, "gateway", gateway_id)?;
        if gateway.network_id.as_deref() != Some(network_id) {
            return Err(CloudError::Conflict(format!(
                "gateway {gateway_id} is not attached to {network_id}"
            )));
        }
        gateway.network_id = None;
        Ok(())
    }

    async fn delete_gateway(&self, session: &Session, gateway_id: &str) -> Result<()> {
        let mut state = self.enter("delete_gateway")?;
        let gateway = get_regional(&mut state.gateways, session, "gateway", gateway_id)?;
        if gateway.network_id.is_some() {
            return Err(CloudError::Conflict(format!(
                "gateway {gateway_id} is still attached"
            )));
        }
        state.gateways.remove(gateway_id);
        Ok(())
    }

    async fn list_route_tables(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<RouteTable>> {
        let state = self.enter("list_route_tables")?;
        Ok(in_region(&state.route_tables, session)
            .filter(|t| t.network_id == network_id)
            .filter(|t| filter.matches(name_tag(&t.tags), &t.tags))
            .cloned()
            .collect())
    }

    async fn create_route_table(
        &self,
        session: &Session,
        network_id: &str,
        tags: &Tags,
    ) -> Result<RouteTable> {
        let mut state = self.enter("create_route_table")?;
        get_regional(&mut state.networks, session, "network", network_id)?;
        let table = RouteTable {
            id: new_id("rtb"),
            network_id: network_id.to_string(),
            main: false,
            routes: Vec::new(),
            associations: Vec::new(),
            tags: tags.clone(),
        };
        state.route_tables.insert(
            table.id.clone(),
            Regional {
                region: session.region().to_string(),
                value: table.clone(),
            },
        );
        Ok(table)
    }

    async fn create_route(
        &self,
        session: &Session,
        route_table_id: &str,
        destination: &str,
        gateway_id: &str,
    ) -> Result<()> {
        let mut state = self.enter("create_route")?;
        get_regional(&mut state.gateways, session, "gateway", gateway_id)?;
        let table = get_regional(&mut state.route_tables, session, "route table", route_table_id)?;
        table.routes.push(Route {
            destination: destination.to_string(),
            gateway_id: gateway_id.to_string(),
        });
        Ok(())
    }

    async fn associate_route_table(
        &self,
        session: &Session,
        route_table_id: &str,
        subnet_id: &str,
    ) -> Result<String> {
        let mut state = self.enter("associate_route_table")?;
        get_regional(&mut state.subnets, session, "subnet", subnet_id)?;
        let table = get_regional(&mut state.route_tables, session, "route table", route_table_id)?;
        let association = RouteTableAssociation {
            id: new_id("rtbassoc"),
            subnet_id: subnet_id.to_string(),
        };
        table.associations.push(association.clone());
        Ok(association.id)
    }

    async fn disassociate_route_table(&self, _session: &Session, association_id: &str) -> Result<()> {
        let mut state = self.enter("disassociate_route_table")?;
        for table in state.route_tables.values_mut() {
            let before = table.value.associations.len();
            table.value.associations.retain(|a| a.id != association_id);
            if table.value.associations.len() != before {
                return Ok(());
            }
        }
        Err(CloudError::not_found("route table association", association_id))
    }

    async fn delete_route_table(&self, session: &Session, route_table_id: &str) -> Result<()> {
        let mut state = self.enter("delete_route_table")?;
        let table = get_regional(&mut state.route_tables, session, "route table", route_table_id)?;
        if table.main {
            return Err(CloudError::Conflict(format!(
                "route table {route_table_id} is the main table"
            )));
        }
        if !table.associations.is_empty() {
            return Err(CloudError::Conflict(format!(
                "route table {route_table_id} has associations"
            )));
        }
        state.route_tables.remove(route_table_id);
        Ok(())
    }

    async fn list_zones(&self, session: &Session) -> Result<Vec<String>> {
        let state = self.enter("list_zones")?;
        Ok(state.zones.clone().unwrap_or_else(|| {
            ["a", "b", "c", "d"]
                .iter()
                .map(|suffix| format!("{}{suffix}", session.region()))
                .collect()
        }))
    }

    async fn list_subnets(
        &self,
        session: &Session,
        network_id: &str,
        filter: &ResourceFilter,
    ) -> Result<Vec<Subnet>> {
        let state = self.enter("list_subnets")?;
        Ok(in_region(&state.subnets, session)
            .filter(|s| s.network_id == network_id)
            .filter(|s| filter.matches(name_tag(&s.tags), &s.tags))
            .cloned()
            .collect())
    }

    async fn create_subnet(
        &self,
        session: &Session,
        network_id: &str,
        cidr: &str,
        zone: &str,
        tags: &Tags,
    ) -> Result<Subnet> {
        let mut state = self.enter("create_subnet")?;
        get_regional(&mut state.networks, session, "network", network_id)?;
        if state
            .subnets
            .values()
            .any(|s| s.value.network_id == network_id && s.value.cidr == cidr)
        {
            return Err(CloudError::Conflict(format!("subnet {cidr} already exists")));
        }
        let subnet = Subnet {
            id: new_id("subnet"),
            network_id: network_id.to_string(),
            cidr: cidr.to_string(),
            zone: zone.to_string(),
            map_public_ip: false,
            tags: tags.clone(),
        };
        state.subnets.insert(
            subnet.id.clone(),
            Regional {
                region: session.region().to_string(),
                value: subnet.clone(),
            },
        );
        Ok(subnet)
    }

    async fn enable_public_ip_on_launch(&self, session: &Session, subnet_id: &str) -> Result<()> {
        let mut state = self.enter("enable_public_ip_on_launch")?;
        get_regional(&mut state.subnets, session, "subnet", subnet_id)?.map_public_ip = true;
        Ok(())
    }

    async fn delete_subnet(&self, session: &Session, subnet_id: &str) -> Result<()> {
        let mut state = self.enter("delete_subnet")?;
        get_regional(&mut state.subnets, session, "subnet", subnet_id)?;
        for table in state.route_tables.values_mut() {
            table.value.associations.retain(|a| a.subnet_id != subnet_id);
        }
        state.subnets.remove(subnet_id);
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for MockCloud {
    async fn get_role(&self, _session: &Session, name: &str) -> Result<Role> {
        let state = self.enter("get_role")?;
        state
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::not_found("role", name))
    }

    async fn create_role(&self, _session: &Session, input: &CreateRoleInput) -> Result<Role> {
        let mut state = self.enter("create_role")?;
        if state.roles.contains_key(&input.name) {
            return Err(CloudError::Conflict(format!(
                "role {} already exists",
                input.name
            )));
        }
        let role = Role {
            name: input.name.clone(),
            id: format!("role/{}", input.name),
            description: input.description.clone(),
            attached_policies: Vec::new(),
            tags: input.tags.clone(),
        };
        state.roles.insert(role.name.clone(), role.clone());
        Ok(role)
    }

    async fn attach_role_policy(
        &self,
        _session: &Session,
        role_name: &str,
        policy: &str,
    ) -> Result<()> {
        let mut state = self.enter("attach_role_policy")?;
        let role = state
            .roles
            .get_mut(role_name)
            .ok_or_else(|| CloudError::not_found("role", role_name))?;
        if !role.attached_policies.iter().any(|p| p == policy) {
            role.attached_policies.push(policy.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerApi for MockCloud {
    async fn list_clusters(&self, session: &Session) -> Result<Vec<String>> {
        let state = self.enter("list_clusters")?;
        Ok(state
            .clusters
            .keys()
            .filter(|(region, _)| region == session.region())
            .map(|(_, name)| name.clone())
            .collect())
    }

    async fn describe_cluster(&self, session: &Session, name: &str) -> Result<ManagedCluster> {
        let state = self.enter("describe_cluster")?;
        state
            .clusters
            .get(&key(session, name))
            .cloned()
            .ok_or_else(|| CloudError::not_found("cluster", name))
    }

    async fn create_cluster(
        &self,
        session: &Session,
        input: &CreateClusterInput,
    ) -> Result<ManagedCluster> {
        let mut state = self.enter("create_cluster")?;
        if state.clusters.contains_key(&key(session, &input.name)) {
            return Err(CloudError::Conflict(format!(
                "cluster {} already exists",
                input.name
            )));
        }
        let cluster = ManagedCluster {
            name: input.name.clone(),
            id: new_id("cluster"),
            status: ClusterStatus::Creating,
            version: Some("1.31".to_string()),
            endpoint: None,
            role_id: input.role_id.clone(),
            subnet_ids: input.subnet_ids.clone(),
            tags: input.tags.clone(),
        };
        state
            .clusters
            .insert(key(session, &input.name), cluster.clone());
        Ok(cluster)
    }

    async fn delete_cluster(&self, session: &Session, name: &str) -> Result<()> {
        let mut state = self.enter("delete_cluster")?;
        if !state.clusters.contains_key(&key(session, name)) {
            return Err(CloudError::not_found("cluster", name));
        }
        reap_deleted_pools(&mut state);
        let region = session.region();
        let attached = state
            .node_pools
            .keys()
            .any(|(r, c, _)| r == region && c == name);
        if attached {
            return Err(CloudError::Conflict(format!(
                "Cluster has nodegroups attached: {name}"
            )));
        }
        if let Some(cluster) = state.clusters.get_mut(&key(session, name)) {
            cluster.status = ClusterStatus::Deleting;
        }
        Ok(())
    }

    async fn cluster_kubeconfig(&self, session: &Session, name: &str) -> Result<String> {
        let state = self.enter("cluster_kubeconfig")?;
        if !state.clusters.contains_key(&key(session, name)) {
            return Err(CloudError::not_found("cluster", name));
        }
        Ok(format!("mock-kubeconfig-{name}"))
    }

    async fn list_node_pools(&self, session: &Session, cluster: &str) -> Result<Vec<String>> {
        let mut state = self.enter("list_node_pools")?;
        if !state.clusters.contains_key(&key(session, cluster)) {
            return Err(CloudError::not_found("cluster", cluster));
        }
        reap_deleted_pools(&mut state);
        let region = session.region();
        Ok(state
            .node_pools
            .keys()
            .filter(|(r, c, _)| r == region && c == cluster)
            .map(|(_, _, p)| p.clone())
            .collect())
    }

    async fn describe_node_pool(
        &self,
        session: &Session,
        cluster: &str,
        pool: &str,
    ) -> Result<NodePool> {
        let mut state = self.enter("describe_node_pool")?;
        reap_deleted_pools(&mut state);
        state
            .node_pools
            .get(&pool_key(session, cluster, pool))
            .map(|p| p.pool.clone())
            .ok_or_else(|| CloudError::not_found("nodegroup", pool))
    }

    async fn create_node_pool(
        &self,
        session: &Session,
        input: &CreateNodePoolInput,
    ) -> Result<NodePool> {
        let mut state = self.enter("create_node_pool")?;
        if !state.clusters.contains_key(&key(session, &input.cluster)) {
            return Err(CloudError::not_found("cluster", &input.cluster));
        }
        let entry_key = pool_key(session, &input.cluster, &input.name);
        if state.node_pools.contains_key(&entry_key) {
            return Err(CloudError::Conflict(format!(
                "nodegroup {} already exists",
                input.name
            )));
        }
        let pool = NodePool {
            name: input.name.clone(),
            cluster: input.cluster.clone(),
            status: NodePoolStatus::Creating,
            role_id: input.role_id.clone(),
            subnet_ids: input.subnet_ids.clone(),
            release_version: input.release_version.clone(),
            instance_types: input.instance_types.clone(),
            capacity_type: input.capacity_type,
            disk_size_gb: input.disk_size_gb,
            scaling: input.scaling,
            labels: input.labels.clone(),
            health_issues: Vec::new(),
            tags: input.tags.clone(),
        };
        state.node_pools.insert(
            entry_key,
            MockPool {
                pool: pool.clone(),
                deletion: None,
            },
        );
        Ok(pool)
    }

    async fn delete_node_pool(&self, session: &Session, cluster: &str, pool: &str) -> Result<()> {
        let mut state = self.enter("delete_node_pool")?;
        let deletion = if state.stuck_pools.contains(pool) {
            Deletion::Never
        } else if state.failing_pools.contains(pool) {
            Deletion::Fail
        } else {
            Deletion::At(Instant::now() + state.pool_delete_delay)
        };
        let entry = state
            .node_pools
            .get_mut(&pool_key(session, cluster, pool))
            .ok_or_else(|| CloudError::not_found("nodegroup", pool))?;
        entry.pool.status = if deletion == Deletion::Fail {
            NodePoolStatus::DeleteFailed
        } else {
            NodePoolStatus::Deleting
        };
        entry.deletion = Some(deletion);
        Ok(())
    }
}

fn reap_deleted_pools(state: &mut State) {
    let now = Instant::now();
    state.node_pools.retain(|_, p| match p.deletion {
        Some(Deletion::At(at)) => at > now,
        _ => true,
    });
}

#[async_trait]
impl VolumeApi for MockCloud {
    async fn create_volume(&self, _session: &Session, input: &CreateVolumeInput) -> Result<Volume> {
        let mut state = self.enter("create_volume")?;
        let volume = Volume {
            id: new_id("vol"),
            zone: input.zone.clone(),
            size_gb: input.size_gb,
            volume_type: input.volume_type.clone(),
            state: VolumeState::Available,
            tags: input.tags.clone(),
        };
        state.volumes.insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn delete_volume(&self, _session: &Session, volume_id: &str) -> Result<()> {
        let mut state = self.enter("delete_volume")?;
        state
            .volumes
            .remove(volume_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found("volume", volume_id))
    }

    async fn create_snapshot(
        &self,
        _session: &Session,
        volume_id: &str,
        tags: &Tags,
    ) -> Result<Snapshot> {
        let mut state = self.enter("create_snapshot")?;
        if !state.volumes.contains_key(volume_id) {
            return Err(CloudError::not_found("volume", volume_id));
        }
        let snapshot = Snapshot {
            id: new_id("snap"),
            volume_id: volume_id.to_string(),
            state: SnapshotState::Pending,
            tags: tags.clone(),
        };
        state.snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn describe_snapshot(&self, _session: &Session, snapshot_id: &str) -> Result<Snapshot> {
        let mut state = self.enter("describe_snapshot")?;
        let snapshot = state
            .snapshots
            .get_mut(snapshot_id)
            .ok_or_else(|| CloudError::not_found("snapshot", snapshot_id))?;
        snapshot.state = SnapshotState::Completed;
        Ok(snapshot.clone())
    }
}

impl CloudApi for MockCloud {
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
    use chrono::Duration as TtlDuration;

    fn session() -> Session {
        Session::new(
            Provider::Aws,
            "us-east-1",
            "123",
            "k",
            "s",
            TtlDuration::minutes(15),
        )
    }

    #[tokio::test]
    async fn counts_calls_and_injects_failures() {
        let cloud = MockCloud::new(Provider::Aws);
        let session = session();

        cloud
            .create_network(&session, "n", "10.0.0.0/16", &Tags::new())
            .await
            .unwrap();
        assert_eq!(cloud.calls("create_network"), 1);
        assert_eq!(cloud.mutation_count(), 1);

        cloud.fail_on("create_gateway", CloudError::Conflict("quota".into()));
        assert!(cloud.create_gateway(&session, &Tags::new()).await.is_err());
        assert_eq!(cloud.calls("create_gateway"), 1);
        assert_eq!(cloud.gateway_count(), 0);

        cloud.clear_failure("create_gateway");
        cloud.create_gateway(&session, &Tags::new()).await.unwrap();
        assert_eq!(cloud.gateway_count(), 1);
    }

    #[tokio::test]
    async fn resources_are_regional() {
        let cloud = MockCloud::new(Provider::Aws);
        let east = session();
        let west = Session::new(
            Provider::Aws,
            "us-west-2",
            "123",
            "k",
            "s",
            TtlDuration::minutes(15),
        );

        cloud
            .create_network(&east, "n", "10.0.0.0/16", &Tags::new())
            .await
            .unwrap();
        let filter = ResourceFilter::default();
        assert_eq!(cloud.list_networks(&east, &filter).await.unwrap().len(), 1);
        assert!(cloud.list_networks(&west, &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cluster_delete_rejected_while_pools_attached() {
        let cloud = MockCloud::new(Provider::Aws);
        let session = session();
        cloud
            .create_cluster(
                &session,
                &CreateClusterInput {
                    name: "c1".into(),
                    role_id: "r".into(),
                    subnet_ids: vec![],
                    tags: Tags::new(),
                    request_token: kubeplane_core::RequestToken::derive(&["c1"]),
                },
            )
            .await
            .unwrap();
        cloud.insert_node_pool(
            "us-east-1",
            NodePool {
                name: "p1".into(),
                cluster: "c1".into(),
                status: NodePoolStatus::Active,
                role_id: "r".into(),
                subnet_ids: vec![],
                release_version: None,
                instance_types: vec!["m5.large".into()],
                capacity_type: crate::types::CapacityType::OnDemand,
                disk_size_gb: 20,
                scaling: crate::types::ScalingConfig {
                    min_size: 1,
                    max_size: 1,
                    desired_size: 1,
                },
                labels: Tags::new(),
                health_issues: vec![],
                tags: Tags::new(),
            },
        );

        let err = cloud.delete_cluster(&session, "c1").await.unwrap_err();
        assert!(matches!(err, CloudError::Conflict(_)));

        cloud.delete_node_pool(&session, "c1", "p1").await.unwrap();
        assert!(cloud
            .describe_node_pool(&session, "c1", "p1")
            .await
            .unwrap_err()
            .is_not_found());
        cloud.delete_cluster(&session, "c1").await.unwrap();
        assert_eq!(
            cloud.cluster_status("us-east-1", "c1"),
            Some(ClusterStatus::Deleting)
        );
    }
}
