//! Cluster control seam
//!
//! The sequencer drives a running local cluster through [`ClusterControl`]:
//! one health check, the node URIs, a status snapshot, and restarting a
//! single node with a new whitelist.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::IdError;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Runner call {call} failed: {detail}")]
    Runner { call: &'static str, detail: String },
    #[error("Cluster is not healthy: {0}")]
    Unhealthy(String),
    #[error("Malformed response from {call}: {detail}")]
    Malformed { call: &'static str, detail: String },
    #[error("Unknown node {0:?}")]
    UnknownNode(String),
    #[error("Cluster has no nodes")]
    NoNodes,
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid subnet id: {0}")]
    Id(#[from] IdError),
}

impl ClusterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClusterError::Timeout { .. })
    }
}

/// One node process of the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub uri: String,
    pub id: String,
    pub log_dir: PathBuf,
    pub plugin_dir: PathBuf,
    /// Comma-separated subnet ids the node tracks
    pub whitelisted_subnets: String,
    /// Node config file contents (JSON)
    pub config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    pub node_infos: BTreeMap<String, NodeInfo>,
    pub healthy: bool,
}

impl ClusterInfo {
    /// Node URIs in node-name order
    pub fn uris(&self) -> Vec<String> {
        self.node_infos.values().map(|n| n.uri.clone()).collect()
    }
}

#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Single health check; `Err` while any node is unhealthy
    async fn health(&self) -> Result<(), ClusterError>;

    async fn uris(&self) -> Result<Vec<String>, ClusterError>;

    async fn status(&self) -> Result<ClusterInfo, ClusterError>;

    /// Remove and re-add `name` with `whitelisted_subnets` as its tracked
    /// subnet list. Returns once the process has been relaunched; the node
    /// may not be healthy yet.
    async fn restart_node(&self, name: &str, whitelisted_subnets: &str)
        -> Result<(), ClusterError>;
}
