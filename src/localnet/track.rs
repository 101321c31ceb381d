//! Track a deployed blockchain on the running local cluster

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::cluster::{ClusterControl, ClusterError};
use super::node_config::merge_whitelist;
use super::readiness::wait_for_blockchains;
use super::restart::{restart_nodes, RestartPlan};
use crate::core::{Id, Network};
use crate::storage::{SidecarStore, StorageError};
use crate::ux::print_to_user;

#[derive(Error, Debug)]
pub enum TrackError {
    #[error("blockchain {0} has not been deployed to {}", Network::Local.name())]
    NotDeployed(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

impl TrackError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrackError::Cluster(e) if e.is_timeout())
    }
}

pub fn rpc_endpoint(uri: &str, blockchain_id: &Id) -> String {
    format!("{}/ext/bc/{}/rpc", uri.trim_end_matches('/'), blockchain_id)
}

/// Restart every node with the blockchain's subnet added to its
/// whitelist, wait until each node runs the chain, and record the RPC
/// endpoints in the sidecar
pub async fn track_blockchain(
    cluster: &dyn ClusterControl,
    sidecars: &SidecarStore,
    name: &str,
    readiness_interval: Duration,
    deadline: Instant,
) -> Result<Vec<String>, TrackError> {
    let mut sidecar = sidecars.load(name)?;
    let (subnet_id, blockchain_id) = match sidecar.network(Network::Local) {
        Some(data) => match (data.subnet_id, data.blockchain_id) {
            (Some(subnet_id), Some(blockchain_id)) => (subnet_id, blockchain_id),
            _ => return Err(TrackError::NotDeployed(name.to_string())),
        },
        None => return Err(TrackError::NotDeployed(name.to_string())),
    };

    let status = cluster.status().await?;
    let mut plans = Vec::with_capacity(status.node_infos.len());
    for node in status.node_infos.values() {
        plans.push(RestartPlan {
            name: node.name.clone(),
            whitelisted_subnets: merge_whitelist(&node.whitelisted_subnets, &[subnet_id])?,
        });
    }
    for plan in &plans {
        print_to_user(&format!(
            "Restarting node {} to track newly deployed network",
            plan.name
        ));
        restart_nodes(cluster, std::slice::from_ref(plan), deadline).await?;
    }

    let status = cluster.status().await?;
    wait_for_blockchains(
        status.node_infos.values(),
        &[blockchain_id],
        readiness_interval,
        deadline,
    )
    .await?;

    let endpoints: Vec<String> = status
        .node_infos
        .values()
        .map(|node| rpc_endpoint(&node.uri, &blockchain_id))
        .collect();
    sidecar.add_rpc_endpoints(Network::Local, &endpoints);
    sidecars.save(&sidecar)?;
    log::info!("tracking {} ({}) on {} node(s)", name, blockchain_id, endpoints.len());
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;

    #[test]
    fn test_rpc_endpoint() {
        let id = content_id(b"chain");
        assert_eq!(
            rpc_endpoint("http://127.0.0.1:9650/", &id),
            format!("http://127.0.0.1:9650/ext/bc/{}/rpc", id)
        );
    }
}
