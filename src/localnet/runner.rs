//! gRPC client for the avalanche-network-runner control server

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use avalanche_network_runner_sdk::rpcpb;
use avalanche_network_runner_sdk::Client;
use reqwest::Url;
use tokio::net::TcpStream;

use super::cluster::{ClusterControl, ClusterError, ClusterInfo, NodeInfo};

/// Control client for one runner server. Each call opens its own gRPC
/// channel so a runner restart between phases is picked up transparently.
pub struct RunnerClient {
    endpoint: String,
    dial_timeout: Duration,
    request_timeout: Duration,
}

impl RunnerClient {
    pub fn new(
        endpoint: &str,
        dial_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ClusterError> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        dial_address(&endpoint)?;
        Ok(Self {
            endpoint,
            dial_timeout,
            request_timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fail fast when nothing listens on the endpoint; opening a channel
    /// to a dead endpoint panics inside the sdk
    async fn dial(&self) -> Result<(), ClusterError> {
        let address = dial_address(&self.endpoint)?;
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ClusterError::Io(e)),
            Err(_) => {
                return Err(ClusterError::Timeout {
                    what: format!("runner at {}", address),
                    waited: self.dial_timeout,
                })
            }
        }
        log::debug!("dialing runner at {}", self.endpoint);
        Ok(())
    }

    async fn call<T, F>(&self, call: &'static str, request: F) -> Result<T, ClusterError>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ClusterError::Timeout {
                what: call.to_string(),
                waited: self.request_timeout,
            })?
            .map_err(|e| ClusterError::Runner {
                call,
                detail: e.to_string(),
            })
    }
}

/// `host:port` of an `http://` runner endpoint
fn dial_address(endpoint: &str) -> Result<String, ClusterError> {
    let url = Url::parse(endpoint).map_err(|e| ClusterError::Malformed {
        call: "runner endpoint",
        detail: format!("{:?}: {}", endpoint, e),
    })?;
    let host = url.host_str().ok_or(ClusterError::Malformed {
        call: "runner endpoint",
        detail: format!("{:?} has no host", endpoint),
    })?;
    let port = url.port_or_known_default().unwrap_or(80);
    Ok(format!("{}:{}", host, port))
}

fn node_info(node: rpcpb::NodeInfo) -> NodeInfo {
    NodeInfo {
        config: String::from_utf8_lossy(&node.config).into_owned(),
        name: node.name,
        uri: node.uri,
        id: node.id,
        log_dir: PathBuf::from(node.log_dir),
        plugin_dir: PathBuf::from(node.plugin_dir),
        whitelisted_subnets: node.whitelisted_subnets,
    }
}

fn cluster_info(
    call: &'static str,
    info: Option<rpcpb::ClusterInfo>,
) -> Result<ClusterInfo, ClusterError> {
    let info = info.ok_or(ClusterError::Malformed {
        call,
        detail: "missing cluster info".to_string(),
    })?;
    let node_infos: BTreeMap<String, NodeInfo> = info
        .node_infos
        .into_iter()
        .map(|(name, node)| (name, node_info(node)))
        .collect();
    Ok(ClusterInfo {
        node_infos,
        healthy: info.healthy,
    })
}

#[async_trait]
impl ClusterControl for RunnerClient {
    async fn health(&self) -> Result<(), ClusterError> {
        self.dial().await?;
        let client = Client::new(&self.endpoint).await;
        let response = self.call("health", client.health()).await?;
        let info = cluster_info("health", response.cluster_info)?;
        if info.healthy {
            Ok(())
        } else {
            Err(ClusterError::Unhealthy(format!(
                "{} node(s) reporting",
                info.node_infos.len()
            )))
        }
    }

    async fn uris(&self) -> Result<Vec<String>, ClusterError> {
        self.dial().await?;
        let client = Client::new(&self.endpoint).await;
        self.call("uris", client.uris()).await
    }

    async fn status(&self) -> Result<ClusterInfo, ClusterError> {
        self.dial().await?;
        let client = Client::new(&self.endpoint).await;
        let response = self.call("status", client.status()).await?;
        cluster_info("status", response.cluster_info)
    }

    async fn restart_node(
        &self,
        name: &str,
        whitelisted_subnets: &str,
    ) -> Result<(), ClusterError> {
        self.dial().await?;
        let client = Client::new(&self.endpoint).await;
        let request = rpcpb::RestartNodeRequest {
            name: name.to_string(),
            whitelisted_subnets: Some(whitelisted_subnets.to_string()),
            ..Default::default()
        };
        // The SDK exposes RestartNode only on the raw gRPC control client
        let restart = async {
            let mut control_client = client.grpc_client.control_client.lock().await;
            control_client
                .restart_node(request)
                .await
                .map(|resp| resp.into_inner())
                .map_err(|e| {
                    std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("failed restart_node '{}'", e),
                    )
                })
        };
        self.call("restart node", restart).await?;
        Ok(())
    }
}
