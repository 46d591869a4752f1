//! Blocking wait helpers for asynchronous provider operations.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::api::{ContainerApi, NetworkApi, VolumeApi};
use crate::error::{CloudError, Result};
use crate::session::Session;
use crate::types::{Network, NetworkState, NodePoolStatus, Snapshot, SnapshotState};

/// Polling cadence and deadline for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Time between checks.
    pub interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl PollOptions {
    /// Create poll options.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `check` until it yields a value or the deadline passes.
///
/// Retriable errors are swallowed and polled again. Any other error ends the
/// wait.
///
/// # Errors
///
/// Returns `CloudError::Timeout` naming `what` once `options.timeout`
/// elapses, or the first non-retriable error from `check`.
pub async fn poll_until<T, F, Fut>(what: &str, options: PollOptions, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        match check().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => trace!(what, "Condition not met yet"),
            Err(e) if e.is_retriable() => trace!(what, error = %e, "Retriable error while polling"),
            Err(e) => return Err(e),
        }

        if Instant::now() + options.interval > deadline {
            return Err(CloudError::Timeout(what.to_string()));
        }
        tokio::time::sleep(options.interval).await;
    }
}

/// Wait until a network is available.
///
/// # Errors
///
/// Returns `CloudError::Timeout` if the network stays pending.
pub async fn wait_network_available<A: NetworkApi + ?Sized>(
    api: &A,
    session: &Session,
    network_id: &str,
    options: PollOptions,
) -> Result<Network> {
    let what = format!("network {network_id} to become available");
    poll_until(&what, options, move || async move {
        let network = api.describe_network(session, network_id).await?;
        Ok((network.state == NetworkState::Available).then_some(network))
    })
    .await
}

/// Wait until a node pool no longer exists.
///
/// # Errors
///
/// Returns `CloudError::Api` if the provider reports the deletion failed,
/// or `CloudError::Timeout` if the pool is still there at the deadline.
pub async fn wait_node_pool_deleted<A: ContainerApi + ?Sized>(
    api: &A,
    session: &Session,
    cluster: &str,
    pool: &str,
    options: PollOptions,
) -> Result<()> {
    let what = format!("node pool {pool} of cluster {cluster} to be deleted");
    poll_until(&what, options, move || async move {
        match api.describe_node_pool(session, cluster, pool).await {
            Ok(found) if found.status == NodePoolStatus::DeleteFailed => Err(CloudError::Api {
                code: "DeleteFailed".to_string(),
                message: format!("deletion of node pool {pool} failed"),
            }),
            Ok(found) => {
                debug!(cluster, pool, status = ?found.status, "Node pool still present");
                Ok(None)
            }
            Err(e) if e.is_not_found() => Ok(Some(())),
            Err(e) => Err(e),
        }
    })
    .await
}

/// Wait until a snapshot has finished copying.
///
/// # Errors
///
/// Returns `CloudError::Api` if the snapshot failed, or `CloudError::Timeout`.
pub async fn wait_snapshot_completed<A: VolumeApi + ?Sized>(
    api: &A,
    session: &Session,
    snapshot_id: &str,
    options: PollOptions,
) -> Result<Snapshot> {
    let what = format!("snapshot {snapshot_id} to complete");
    poll_until(&what, options, move || async move {
        let snapshot = api.describe_snapshot(session, snapshot_id).await?;
        match snapshot.state {
            SnapshotState::Completed => Ok(Some(snapshot)),
            SnapshotState::Pending => Ok(None),
            SnapshotState::Error => Err(CloudError::Api {
                code: "SnapshotFailed".to_string(),
                message: format!("snapshot {snapshot_id} failed"),
            }),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> PollOptions {
        PollOptions::new(Duration::from_millis(10), Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn poll_returns_first_value() {
        let calls = &AtomicU32::new(0);
        let value = poll_until("counter", fast(), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok((n == 2).then_some(n))
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out() {
        let err = poll_until::<(), _, _>("nothing", fast(), || async { Ok(None) })
            .await
            .unwrap_err();
        assert_eq!(err, CloudError::Timeout("nothing".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_retries_transport_errors() {
        let calls = &AtomicU32::new(0);
        let value = poll_until("flaky", fast(), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CloudError::Transport("reset".into()))
            } else {
                Ok(Some("done"))
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_stops_on_hard_error() {
        let err = poll_until::<(), _, _>("broken", fast(), || async {
            Err(CloudError::Conflict("nope".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, CloudError::Conflict(_)));
    }
}
