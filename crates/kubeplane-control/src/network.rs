//! Network stack provisioning.
//!
//! Each (provider, account, region) gets one shared network stack: a
//! network, an internet gateway, a public route table and up to three
//! subnets. Stacks are discovered by name and ownership tags, created
//! lazily when none exists, and only ever deleted by a failed creation's
//! rollback.

use std::collections::HashMap;
use std::sync::Arc;

use kubeplane_cloud::wait::wait_network_available;
use kubeplane_cloud::{NetworkApi, PollOptions, ResourceFilter, Session, Subnet};
use kubeplane_core::{Ownership, Provider, Tags};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::error::{ControlError, Result};
use crate::types::ControlConfig;

/// Address block of every managed network.
pub const NETWORK_CIDR: &str = "192.168.0.0/16";

/// Provisioner marker written to network resources.
pub const PROVISIONER: &str = "kubeplane-network";

/// Network tag recording the subnets built at creation, as
/// `zone=cidr` pairs joined by commas.
pub const SUBNETS_KEY: &str = "kubeplane.io/subnets";

const DEFAULT_ROUTE: &str = "0.0.0.0/0";
const MAX_ZONES: usize = 3;

// Subnet blocks by region size. At most three zones are used, so both
// tables reduce to the same three blocks.
const FOUR_ZONE_SUBNETS: [&str; MAX_ZONES] =
    ["192.168.0.0/18", "192.168.64.0/18", "192.168.128.0/18"];
const EIGHT_ZONE_SUBNETS: [&str; MAX_ZONES] =
    ["192.168.0.0/18", "192.168.64.0/18", "192.168.128.0/18"];

/// A complete network stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStack {
    /// The network.
    pub network_id: String,
    /// The internet gateway attached to the network.
    pub gateway_id: String,
    /// Non-main route tables routing through the gateway.
    pub route_table_ids: Vec<String>,
    /// Subnets, ordered by zone.
    pub subnet_ids: Vec<String>,
}

/// What a failed creation got as far as building.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialStack {
    /// The network, if created.
    pub network_id: Option<String>,
    /// The gateway, if created.
    pub gateway_id: Option<String>,
    /// Whether the gateway was attached to the network.
    pub gateway_attached: bool,
    /// Route tables created.
    pub route_table_ids: Vec<String>,
    /// Route table associations created.
    pub association_ids: Vec<String>,
    /// Subnets created.
    pub subnet_ids: Vec<String>,
}

impl PartialStack {
    /// Whether nothing was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.network_id.is_none()
            && self.gateway_id.is_none()
            && self.route_table_ids.is_empty()
            && self.subnet_ids.is_empty()
    }
}

type RegionKey = (Provider, String, String);

/// Serializes discover-or-create per (provider, account, region) within
/// this process.
#[derive(Default)]
pub struct RegionGuard {
    locks: Mutex<HashMap<RegionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl RegionGuard {
    /// Create a new guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one region's network stack.
    pub async fn lock(&self, provider: Provider, account: &str, region: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry((provider, account.to_string(), region.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Pair the (sorted) zones to use with their subnet blocks.
fn plan_subnets(mut zones: Vec<String>) -> Vec<(String, &'static str)> {
    let table = if zones.len() > 4 {
        &EIGHT_ZONE_SUBNETS
    } else {
        &FOUR_ZONE_SUBNETS
    };
    zones.sort();
    zones.truncate(MAX_ZONES);
    zones.into_iter().zip(table.iter().copied()).collect()
}

fn encode_plan(plan: &[(String, &str)]) -> String {
    plan.iter()
        .map(|(zone, cidr)| format!("{zone}={cidr}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Subnets a network was built with, as `(zone, cidr)`. A zone is `None`
/// when the network predates [`SUBNETS_KEY`]; those networks are expected to
/// hold a gap-free prefix of the subnet table.
fn built_subnets(tags: &Tags, subnets: &[Subnet]) -> Vec<(Option<String>, String)> {
    let recorded: Option<Vec<_>> = tags.get(SUBNETS_KEY).and_then(|value| {
        value
            .split(',')
            .map(|pair| {
                pair.split_once('=')
                    .map(|(zone, cidr)| (Some(zone.to_string()), cidr.to_string()))
            })
            .collect()
    });
    if let Some(plan) = recorded.filter(|plan| !plan.is_empty()) {
        return plan;
    }

    let last = FOUR_ZONE_SUBNETS
        .iter()
        .rposition(|cidr| subnets.iter().any(|s| s.cidr == *cidr))
        .unwrap_or(0);
    FOUR_ZONE_SUBNETS[..=last]
        .iter()
        .map(|cidr| (None, (*cidr).to_string()))
        .collect()
}

/// Discovers, creates and rolls back regional network stacks.
pub struct NetworkProvisioner {
    ownership: Ownership,
    name_prefix: String,
    wait: PollOptions,
    guard: Arc<RegionGuard>,
}

impl NetworkProvisioner {
    /// Create a provisioner from the control plane configuration.
    #[must_use]
    pub fn new(config: &ControlConfig, guard: Arc<RegionGuard>) -> Self {
        Self {
            ownership: config.ownership(),
            name_prefix: config.name_prefix.clone(),
            wait: PollOptions::new(
                config.poll_interval(),
                std::time::Duration::from_secs(config.network_wait_timeout_seconds),
            ),
            guard,
        }
    }

    /// The network name used in a region.
    #[must_use]
    pub fn network_name(&self, region: &str) -> String {
        format!("{}-{region}-network", self.name_prefix)
    }

    /// Find this deployment's network stack in the session's region.
    ///
    /// Returns `Ok(None)` when no matching network exists.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NetworkHalfProvisioned` if a matching network
    /// lacks its gateway, route table or any expected subnet.
    pub async fn discover<A: NetworkApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
    ) -> Result<Option<NetworkStack>> {
        let name = self.network_name(session.region());
        let tags = self.ownership.tags();

        let mut networks = api
            .list_networks(session, &ResourceFilter::named(name.clone(), tags.clone()))
            .await?;
        networks.retain(|n| self.ownership.matches(&n.tags));
        networks.sort_by(|a, b| a.id.cmp(&b.id));

        let Some(network) = networks.first().cloned() else {
            debug!(network = %name, "No network found");
            return Ok(None);
        };
        if networks.len() > 1 {
            warn!(
                network = %name,
                count = networks.len(),
                using = %network.id,
                "Multiple matching networks"
            );
        }

        let mut missing = Vec::new();

        let gateway = api
            .list_gateways(session, &ResourceFilter::tagged(tags.clone()))
            .await?
            .into_iter()
            .find(|g| g.network_id.as_deref() == Some(network.id.as_str()));
        if gateway.is_none() {
            missing.push("gateway".to_string());
        }

        let route_table_ids: Vec<String> = api
            .list_route_tables(session, &network.id, &ResourceFilter::tagged(tags.clone()))
            .await?
            .into_iter()
            .filter(|t| !t.main)
            .map(|t| t.id)
            .collect();
        if route_table_ids.is_empty() {
            missing.push("route table".to_string());
        }

        // Expected subnets come from the network itself, never the live
        // zone list.
        let subnets = api
            .list_subnets(session, &network.id, &ResourceFilter::tagged(tags))
            .await?;
        let built = built_subnets(&network.tags, &subnets);
        let mut subnet_ids = Vec::with_capacity(built.len());
        for (zone, cidr) in &built {
            match (subnets.iter().find(|s| s.cidr == *cidr), zone) {
                (Some(subnet), _) => subnet_ids.push(subnet.id.clone()),
                (None, Some(zone)) => missing.push(format!("subnet {cidr} ({zone})")),
                (None, None) => missing.push(format!("subnet {cidr}")),
            }
        }

        if !missing.is_empty() {
            return Err(ControlError::NetworkHalfProvisioned {
                network_id: network.id,
                missing,
            });
        }

        let gateway_id = gateway.map(|g| g.id).unwrap_or_default();
        debug!(network_id = %network.id, %gateway_id, "Discovered network stack");

        Ok(Some(NetworkStack {
            network_id: network.id,
            gateway_id,
            route_table_ids,
            subnet_ids,
        }))
    }

    /// Create a network stack, recording each created resource in `partial`.
    ///
    /// # Errors
    ///
    /// Returns the first failing cloud call; `partial` then describes what
    /// must be rolled back.
    pub async fn create<A: NetworkApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
        partial: &mut PartialStack,
    ) -> Result<NetworkStack> {
        let region = session.region();
        let name = self.network_name(region);
        let tags = |resource: &str| self.ownership.provisioned_tags(PROVISIONER, resource);

        let plan = plan_subnets(api.list_zones(session).await?);
        if plan.is_empty() {
            return Err(ControlError::Validation(format!(
                "region {region} reports no availability zones"
            )));
        }

        let mut network_tags = tags(&name);
        network_tags.insert(SUBNETS_KEY.to_string(), encode_plan(&plan));
        let network = api
            .create_network(session, &name, NETWORK_CIDR, &network_tags)
            .await?;
        partial.network_id = Some(network.id.clone());
        info!(network_id = %network.id, network = %name, cidr = NETWORK_CIDR, "Created network");

        wait_network_available(api, session, &network.id, self.wait).await?;

        let gateway = api
            .create_gateway(session, &tags(&format!("{name}-gateway")))
            .await?;
        partial.gateway_id = Some(gateway.id.clone());
        info!(gateway_id = %gateway.id, "Created gateway");

        api.attach_gateway(session, &gateway.id, &network.id).await?;
        partial.gateway_attached = true;
        info!(gateway_id = %gateway.id, network_id = %network.id, "Attached gateway");

        let table = api
            .create_route_table(session, &network.id, &tags(&format!("{name}-routes")))
            .await?;
        partial.route_table_ids.push(table.id.clone());
        info!(route_table_id = %table.id, "Created route table");

        api.create_route(session, &table.id, DEFAULT_ROUTE, &gateway.id)
            .await?;
        info!(route_table_id = %table.id, destination = DEFAULT_ROUTE, "Created route");

        let mut subnet_ids = Vec::with_capacity(plan.len());
        for (zone, cidr) in &plan {
            let subnet = api
                .create_subnet(session, &network.id, cidr, zone, &tags(&format!("{name}-{zone}")))
                .await?;
            partial.subnet_ids.push(subnet.id.clone());
            info!(subnet_id = %subnet.id, %zone, %cidr, "Created subnet");

            api.enable_public_ip_on_launch(session, &subnet.id).await?;

            let association = api
                .associate_route_table(session, &table.id, &subnet.id)
                .await?;
            partial.association_ids.push(association);
            subnet_ids.push(subnet.id);
        }

        Ok(NetworkStack {
            network_id: network.id,
            gateway_id: gateway.id,
            route_table_ids: partial.route_table_ids.clone(),
            subnet_ids,
        })
    }

    /// Delete whatever a failed creation left behind.
    ///
    /// Every step runs even if an earlier one failed. Resources that are
    /// already gone count as deleted.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::RollbackIncomplete` listing every failed step.
    pub async fn rollback<A: NetworkApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
        partial: &PartialStack,
    ) -> Result<()> {
        let mut failures = Vec::new();

        for subnet_id in &partial.subnet_ids {
            let result = api.delete_subnet(session, subnet_id).await;
            settle(&mut failures, &format!("subnet {subnet_id}"), result);
        }

        for association_id in &partial.association_ids {
            let result = api.disassociate_route_table(session, association_id).await;
            settle(&mut failures, &format!("association {association_id}"), result);
        }
        for table_id in &partial.route_table_ids {
            let result = api.delete_route_table(session, table_id).await;
            settle(&mut failures, &format!("route table {table_id}"), result);
        }

        if let Some(gateway_id) = &partial.gateway_id {
            if partial.gateway_attached {
                if let Some(network_id) = &partial.network_id {
                    let result = api.detach_gateway(session, gateway_id, network_id).await;
                    settle(&mut failures, &format!("gateway attachment {gateway_id}"), result);
                }
            }
            let result = api.delete_gateway(session, gateway_id).await;
            settle(&mut failures, &format!("gateway {gateway_id}"), result);
        }

        if let Some(network_id) = &partial.network_id {
            let result = api.delete_network(session, network_id).await;
            settle(&mut failures, &format!("network {network_id}"), result);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ControlError::RollbackIncomplete(failures))
        }
    }

    /// Reuse the region's network stack, creating it if none exists.
    ///
    /// Concurrent calls for the same region in this process are serialized.
    /// A failed creation is rolled back and its original error returned.
    ///
    /// # Errors
    ///
    /// Returns discovery errors (including a half-provisioned network) or
    /// the creation error.
    pub async fn discover_or_create<A: NetworkApi + ?Sized>(
        &self,
        api: &A,
        session: &Session,
    ) -> Result<NetworkStack> {
        let _guard = self
            .guard
            .lock(session.provider(), session.account(), session.region())
            .await;

        if let Some(stack) = self.discover(api, session).await? {
            info!(network_id = %stack.network_id, region = session.region(), "Reusing network stack");
            return Ok(stack);
        }

        let mut partial = PartialStack::default();
        match self.create(api, session, &mut partial).await {
            Ok(stack) => Ok(stack),
            Err(e) => {
                warn!(region = session.region(), error = %e, "Network creation failed, rolling back");
                if let Err(rollback) = self.rollback(api, session, &partial).await {
                    error!(region = session.region(), error = %rollback, "Network rollback incomplete");
                }
                Err(e)
            }
        }
    }
}

fn settle(failures: &mut Vec<String>, resource: &str, result: kubeplane_cloud::Result<()>) {
    match result {
        Ok(()) => warn!(resource, "Rolled back"),
        Err(e) if e.is_not_found() => debug!(resource, "Already gone"),
        Err(e) => {
            error!(resource, error = %e, "Rollback step failed");
            failures.push(format!("{resource}: {e}"));
        }
    }
}
