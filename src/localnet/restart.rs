//! Serialized node restarts
//!
//! Only one node is ever mid-restart, across every sequencer in the
//! process: each restart holds a process-wide lock from relaunch until the
//! cluster reports healthy again.

use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::cluster::{ClusterControl, ClusterError};
use crate::resilience::{poll_until, Backoff, PollError};

const HEALTH_BACKOFF_BASE: Duration = Duration::from_secs(1);
const HEALTH_BACKOFF_MAX: Duration = Duration::from_secs(15);

static RESTART_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn restart_lock() -> &'static Mutex<()> {
    RESTART_LOCK.get_or_init(|| Mutex::new(()))
}

/// Node name and the whitelist it should come back with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPlan {
    pub name: String,
    pub whitelisted_subnets: String,
}

/// Poll cluster health until it holds or `deadline` passes
pub async fn wait_for_health(
    cluster: &dyn ClusterControl,
    deadline: Instant,
) -> Result<(), ClusterError> {
    log::info!("checking cluster healthiness...");
    let backoff = Backoff::exponential(HEALTH_BACKOFF_BASE, HEALTH_BACKOFF_MAX);

    let result = poll_until(&backoff, deadline, || async move {
        match cluster.health().await {
            Ok(()) => {
                log::info!("healthy now!");
                Ok::<bool, ClusterError>(true)
            }
            Err(e) => {
                log::warn!("not healthy yet {}", e);
                Ok(false)
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(PollError::Failed(e)) => Err(e),
        Err(PollError::Timeout { waited }) => Err(ClusterError::Timeout {
            what: "cluster health".to_string(),
            waited,
        }),
    }
}

/// Restart each planned node in order, waiting for cluster health after
/// every one
pub async fn restart_nodes(
    cluster: &dyn ClusterControl,
    plans: &[RestartPlan],
    deadline: Instant,
) -> Result<(), ClusterError> {
    for plan in plans {
        let _guard = restart_lock().lock().await;
        log::info!(
            "restarting node {} with whitelisted subnets {:?}",
            plan.name,
            plan.whitelisted_subnets
        );
        cluster
            .restart_node(&plan.name, &plan.whitelisted_subnets)
            .await?;

        log::info!("waiting for local cluster readiness after restart of {}", plan.name);
        wait_for_health(cluster, deadline).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;

    use crate::localnet::cluster::ClusterInfo;

    /// Records restarts and flags any overlap between two in-flight restarts
    #[derive(Default)]
    struct CountingCluster {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        unhealthy_checks: AtomicUsize,
        restarted: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ClusterControl for CountingCluster {
        async fn health(&self) -> Result<(), ClusterError> {
            if self.unhealthy_checks.load(Ordering::SeqCst) > 0 {
                self.unhealthy_checks.fetch_sub(1, Ordering::SeqCst);
                return Err(ClusterError::Unhealthy("booting".to_string()));
            }
            self.in_flight.store(0, Ordering::SeqCst);
            Ok(())
        }

        async fn uris(&self) -> Result<Vec<String>, ClusterError> {
            Ok(Vec::new())
        }

        async fn status(&self) -> Result<ClusterInfo, ClusterError> {
            Ok(ClusterInfo::default())
        }

        async fn restart_node(&self, name: &str, _: &str) -> Result<(), ClusterError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.unhealthy_checks.store(2, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.restarted.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    fn plan(name: &str) -> RestartPlan {
        RestartPlan {
            name: name.to_string(),
            whitelisted_subnets: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_are_sequential() {
        let cluster = CountingCluster::default();
        let plans = vec![plan("node1"), plan("node2"), plan("node3")];

        restart_nodes(&cluster, &plans, Instant::now() + Duration::from_secs(600))
            .await
            .unwrap();

        assert_eq!(
            *cluster.restarted.lock().unwrap(),
            vec!["node1", "node2", "node3"]
        );
        assert_eq!(cluster.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_runs_never_overlap() {
        let cluster = Arc::new(CountingCluster::default());
        let deadline = Instant::now() + Duration::from_secs(600);

        let a = {
            let cluster = Arc::clone(&cluster);
            tokio::spawn(async move {
                restart_nodes(cluster.as_ref(), &[plan("a1"), plan("a2")], deadline).await
            })
        };
        let b = {
            let cluster = Arc::clone(&cluster);
            tokio::spawn(async move {
                restart_nodes(cluster.as_ref(), &[plan("b1"), plan("b2")], deadline).await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(cluster.restarted.lock().unwrap().len(), 4);
        assert_eq!(cluster.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_wait_times_out() {
        let cluster = CountingCluster::default();
        cluster.unhealthy_checks.store(usize::MAX, Ordering::SeqCst);
        let started = Instant::now();

        let err = wait_for_health(&cluster, started + Duration::from_secs(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }
}
