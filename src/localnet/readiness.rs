//! Blockchain readiness wait
//!
//! A node has instantiated a blockchain once `<log dir>/<blockchain id>.log`
//! exists. There is no bound on the wait other than the caller's deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

use super::cluster::{ClusterError, NodeInfo};
use crate::core::Id;
use crate::resilience::{poll_until, Backoff, PollError};

pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub fn blockchain_log_path(log_dir: &Path, blockchain_id: &Id) -> PathBuf {
    log_dir.join(format!("{}.log", blockchain_id))
}

/// Wait for one log file to appear
pub async fn wait_for_log_file(
    path: &Path,
    interval: Duration,
    deadline: Instant,
) -> Result<(), ClusterError> {
    let result = poll_until(&Backoff::constant(interval), deadline, || async move {
        if path.exists() {
            log::info!("found the log {}", path.display());
            Ok::<bool, ClusterError>(true)
        } else {
            log::info!("log not found yet, retrying... {}", path.display());
            Ok(false)
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(PollError::Failed(e)) => Err(e),
        Err(PollError::Timeout { waited }) => Err(ClusterError::Timeout {
            what: format!("log file {}", path.display()),
            waited,
        }),
    }
}

/// Wait until every node has a log for every blockchain in `blockchains`
pub async fn wait_for_blockchains<'a>(
    nodes: impl IntoIterator<Item = &'a NodeInfo>,
    blockchains: &[Id],
    interval: Duration,
    deadline: Instant,
) -> Result<(), ClusterError> {
    for node in nodes {
        log::info!(
            "inspecting node {} log directory {} for blockchain logs",
            node.name,
            node.log_dir.display()
        );
        for blockchain_id in blockchains {
            let path = blockchain_log_path(&node.log_dir, blockchain_id);
            wait_for_log_file(&path, interval, deadline).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;

    fn node(name: &str, log_dir: &Path) -> NodeInfo {
        NodeInfo {
            name: name.to_string(),
            uri: format!("http://{}", name),
            id: String::new(),
            log_dir: log_dir.to_path_buf(),
            plugin_dir: PathBuf::new(),
            whitelisted_subnets: String::new(),
            config: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_log_returns_immediately() {
        let temp_dir = tempfile::tempdir().unwrap();
        let chain = content_id(b"chain");
        std::fs::write(blockchain_log_path(temp_dir.path(), &chain), "").unwrap();
        let started = Instant::now();

        wait_for_blockchains(
            &[node("node1", temp_dir.path())],
            &[chain],
            READINESS_POLL_INTERVAL,
            started + Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_log_times_out_at_deadline() {
        let temp_dir = tempfile::tempdir().unwrap();
        let started = Instant::now();

        let err = wait_for_log_file(
            &blockchain_log_path(temp_dir.path(), &content_id(b"never")),
            READINESS_POLL_INTERVAL,
            started + Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_appearing_later_is_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = blockchain_log_path(temp_dir.path(), &content_id(b"late"));
        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(15)).await;
            std::fs::write(writer_path, "").unwrap();
        });
        let started = Instant::now();

        wait_for_log_file(&path, READINESS_POLL_INTERVAL, started + Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }
}
