//! Waiting for a new cluster to become active.

use std::future::Future;
use std::time::Duration;

use kubeplane_cloud::ClusterStatus;
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};

/// A fixed schedule of waits, with a status check after each.
///
/// The default schedule waits 6, 4 and then 2 minutes. A cluster that isn't
/// ACTIVE after the last check, or that reports FAILED earlier, has failed
/// to activate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationPolicy {
    waits: Vec<Duration>,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self::from_secs(&[360, 240, 120])
    }
}

impl ActivationPolicy {
    /// Create a policy from explicit waits.
    #[must_use]
    pub fn new(waits: Vec<Duration>) -> Self {
        Self { waits }
    }

    /// Create a policy from waits in seconds.
    #[must_use]
    pub fn from_secs(waits: &[u64]) -> Self {
        Self::new(waits.iter().copied().map(Duration::from_secs).collect())
    }

    /// The wait schedule.
    #[must_use]
    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    /// Run the schedule until `check` reports ACTIVE.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ActivationFailed` if the cluster reports
    /// FAILED or the schedule runs out, and any error from `check`.
    pub async fn wait_until_active<F, Fut>(&self, cluster: &str, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ClusterStatus>>,
    {
        let mut last_status = ClusterStatus::Unknown;

        for (attempt, wait) in self.waits.iter().enumerate() {
            debug!(cluster, attempt, wait_secs = wait.as_secs(), "Waiting for cluster activation");
            tokio::time::sleep(*wait).await;

            last_status = check().await?;
            match last_status {
                ClusterStatus::Active => {
                    info!(cluster, attempt, "Cluster is active");
                    return Ok(());
                }
                ClusterStatus::Failed => break,
                status => debug!(cluster, %status, "Cluster not active yet"),
            }
        }

        warn!(cluster, %last_status, "Cluster did not become active");
        Err(ControlError::ActivationFailed {
            name: cluster.to_string(),
            last_status,
        })
    }
}
