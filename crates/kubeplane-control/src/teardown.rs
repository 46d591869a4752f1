//! Concurrent teardown waits.
//!
//! [`wait_for_all`] fans out one task per resource and fans their results
//! back in through a single channel:
//!
//! ```text
//!   resource tasks ──┬── Failed ───┐
//!   (one each)       └── Cancelled ┤
//!                                  ├──► channel (len + 1) ──► TeardownReport
//!   batch timer ───────── TimedOut ┘
//! ```
//!
//! The join over all tasks races one timer. When the timer wins, the
//! timeout goes into the channel, the shared cancellation token stops every
//! remaining task, and their cancellations are dropped from the report. A
//! timeout does not undo provider-side deletions that are already underway.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kubeplane_cloud::wait::wait_node_pool_deleted;
use kubeplane_cloud::{CloudApi, PollOptions, Session};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{ControlError, Result};

/// One entry of a teardown report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownFailure {
    /// The batch timer ran out.
    TimedOut {
        /// The bound that was exceeded.
        after: Duration,
    },
    /// Waiting on one resource failed.
    Resource {
        /// The resource name.
        name: String,
        /// What went wrong.
        message: String,
    },
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut { after } => write!(
                f,
                "timed out after {}s, deletions may still complete",
                after.as_secs()
            ),
            Self::Resource { name, message } => write!(f, "{name}: {message}"),
        }
    }
}

/// Aggregated outcome of a failed teardown wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Failures in the order they were reported.
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    /// Whether the batch timer ran out.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, TeardownFailure::TimedOut { .. }))
    }

    /// Names of the resources whose wait failed.
    pub fn failed_resources(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().filter_map(|f| match f {
            TeardownFailure::Resource { name, .. } => Some(name.as_str()),
            TeardownFailure::TimedOut { .. } => None,
        })
    }
}

impl fmt::Display for TeardownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
enum TeardownEvent {
    TimedOut,
    Failed { resource: String, error: String },
    Cancelled { resource: String },
}

async fn join_all(tasks: &mut JoinSet<()>, panics: &mut Vec<String>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if !e.is_cancelled() {
                error!(error = %e, "Teardown task panicked");
                panics.push(e.to_string());
            }
        }
    }
}

/// Wait for every resource's teardown concurrently, bounded by `timeout`.
///
/// `wait_one` produces the wait for one resource.
///
/// # Errors
///
/// Returns `ControlError::TeardownTimedOut` if the bound ran out, with the
/// timeout listed exactly once alongside any per-resource failures, and
/// `ControlError::TeardownFailed` if some waits failed within the bound.
pub async fn wait_for_all<F, Fut, E>(
    resources: &[String],
    timeout: Duration,
    wait_one: F,
) -> Result<()>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(resources.len() + 1);
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    for resource in resources {
        let tx = tx.clone();
        let cancel = cancel.clone();
        let wait = wait_one(resource.clone());
        let resource = resource.clone();

        tasks.spawn(async move {
            let event = tokio::select! {
                () = cancel.cancelled() => Some(TeardownEvent::Cancelled {
                    resource: resource.clone(),
                }),
                result = wait => result.err().map(|e| TeardownEvent::Failed {
                    resource: resource.clone(),
                    error: e.to_string(),
                }),
            };
            if let Some(event) = event {
                // Capacity covers one event per task plus the timeout.
                let _ = tx.send(event).await;
            }
        });
    }

    let mut panics = Vec::new();
    let finished = tokio::time::timeout(timeout, join_all(&mut tasks, &mut panics))
        .await
        .is_ok();
    if !finished {
        warn!(
            timeout_secs = timeout.as_secs(),
            pending = tasks.len(),
            "Teardown wait timed out"
        );
        let _ = tx.send(TeardownEvent::TimedOut).await;
        cancel.cancel();
        join_all(&mut tasks, &mut panics).await;
    }
    drop(tx);

    let mut report = TeardownReport::default();
    while let Some(event) = rx.recv().await {
        match event {
            TeardownEvent::TimedOut => {
                report
                    .failures
                    .push(TeardownFailure::TimedOut { after: timeout });
            }
            TeardownEvent::Failed { resource, error } => {
                warn!(resource = %resource, error = %error, "Teardown failed");
                report.failures.push(TeardownFailure::Resource {
                    name: resource,
                    message: error,
                });
            }
            TeardownEvent::Cancelled { resource } => {
                debug!(resource = %resource, "Teardown wait cancelled");
            }
        }
    }
    for panic in panics {
        report.failures.push(TeardownFailure::Resource {
            name: "<task>".to_string(),
            message: panic,
        });
    }

    if report.timed_out() {
        Err(ControlError::TeardownTimedOut(report))
    } else if report.failures.is_empty() {
        Ok(())
    } else {
        Err(ControlError::TeardownFailed(report))
    }
}

/// Wait for the deletion of every listed node pool of a cluster.
///
/// # Errors
///
/// See [`wait_for_all`].
pub async fn wait_for_all_deletions(
    api: Arc<dyn CloudApi>,
    session: &Session,
    cluster: &str,
    pools: &[String],
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    // Each pool's own deadline sits past the batch bound so the batch timer
    // always decides.
    let options = PollOptions::new(poll_interval, timeout + poll_interval);

    wait_for_all(pools, timeout, |pool| {
        let api = Arc::clone(&api);
        let session = session.clone();
        let cluster = cluster.to_string();
        async move {
            wait_node_pool_deleted(api.as_ref(), &session, &cluster, &pool, options).await
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeplane_cloud::{
        CapacityType, ClusterStatus, ContainerApi, ManagedCluster, MockCloud, NodePool,
        NodePoolStatus, ScalingConfig,
    };
    use kubeplane_core::{Provider, Tags};

    const REGION: &str = "us-east-1";

    fn session() -> Session {
        Session::new(
            Provider::Aws,
            REGION,
            "123456789012",
            "AKIA",
            "secret",
            chrono::Duration::hours(1),
        )
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    fn cloud_with_pools(pools: &[&str]) -> Arc<MockCloud> {
        let cloud = Arc::new(MockCloud::new(Provider::Aws));
        cloud.insert_cluster(
            REGION,
            ManagedCluster {
                name: "c1".into(),
                id: "cluster-1".into(),
                status: ClusterStatus::Active,
                version: None,
                endpoint: None,
                role_id: "role/r".into(),
                subnet_ids: Vec::new(),
                tags: Tags::new(),
            },
        );
        for pool in pools {
            cloud.insert_node_pool(
                REGION,
                NodePool {
                    name: (*pool).to_string(),
                    cluster: "c1".into(),
                    status: NodePoolStatus::Active,
                    role_id: "role/r".into(),
                    subnet_ids: Vec::new(),
                    release_version: None,
                    instance_types: vec!["m5.large".into()],
                    capacity_type: CapacityType::OnDemand,
                    disk_size_gb: 20,
                    scaling: ScalingConfig {
                        min_size: 1,
                        max_size: 1,
                        desired_size: 1,
                    },
                    labels: Tags::new(),
                    health_issues: Vec::new(),
                    tags: Tags::new(),
                },
            );
        }
        cloud
    }

    async fn delete_all(cloud: &MockCloud, pools: &[&str]) {
        for pool in pools {
            cloud.delete_node_pool(&session(), "c1", pool).await.unwrap();
        }
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let result = wait_for_all(&[], Duration::from_secs(1), |_| async {
            Ok::<(), String>(())
        })
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failures_are_aggregated() {
        let resources = names(&["a", "bad", "worse"]);
        let result = wait_for_all(&resources, Duration::from_secs(5), |name| async move {
            if name == "a" {
                Ok(())
            } else {
                Err(format!("{name} broke"))
            }
        })
        .await;

        let Err(ControlError::TeardownFailed(report)) = result else {
            panic!("expected TeardownFailed");
        };
        let mut failed: Vec<&str> = report.failed_resources().collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["bad", "worse"]);
        assert!(!report.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn all_pools_deleted_within_bound() {
        let pools = ["p1", "p2", "p3"];
        let cloud = cloud_with_pools(&pools);
        cloud.set_node_pool_delete_delay(Duration::from_secs(45));
        delete_all(&cloud, &pools).await;

        wait_for_all_deletions(
            cloud.clone(),
            &session(),
            "c1",
            &names(&pools),
            Duration::from_secs(600),
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(cloud.node_pool_names(REGION, "c1").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_exactly_once() {
        let pools = ["p1", "p2", "p3"];
        let cloud = cloud_with_pools(&pools);
        cloud.hang_node_pool_deletion("p2");
        cloud.hang_node_pool_deletion("p3");
        delete_all(&cloud, &pools).await;

        let err = wait_for_all_deletions(
            cloud.clone(),
            &session(),
            "c1",
            &names(&pools),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        let ControlError::TeardownTimedOut(report) = err else {
            panic!("expected TeardownTimedOut");
        };
        assert_eq!(
            report.failures,
            vec![TeardownFailure::TimedOut {
                after: Duration::from_secs(60)
            }]
        );
        assert!(report.to_string().contains("may still complete"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deletion_is_distinct_from_timeout() {
        let pools = ["p1", "p2"];
        let cloud = cloud_with_pools(&pools);
        cloud.fail_node_pool_deletion("p2");
        delete_all(&cloud, &pools).await;

        let err = wait_for_all_deletions(
            cloud.clone(),
            &session(),
            "c1",
            &names(&pools),
            Duration::from_secs(600),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        let ControlError::TeardownFailed(report) = err else {
            panic!("expected TeardownFailed");
        };
        assert_eq!(report.failed_resources().collect::<Vec<_>>(), vec!["p2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_before_timeout_are_kept() {
        let pools = ["p1", "p2"];
        let cloud = cloud_with_pools(&pools);
        cloud.fail_node_pool_deletion("p1");
        cloud.hang_node_pool_deletion("p2");
        delete_all(&cloud, &pools).await;

        let err = wait_for_all_deletions(
            cloud.clone(),
            &session(),
            "c1",
            &names(&pools),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();

        let ControlError::TeardownTimedOut(report) = err else {
            panic!("expected TeardownTimedOut");
        };
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failed_resources().collect::<Vec<_>>(), vec!["p1"]);
        assert!(report.timed_out());
    }
}
