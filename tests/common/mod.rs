//! In-memory node and cluster fakes shared by the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tempfile::TempDir;

use subnet_cli::client::{ClientError, Connector, PlatformClient, SubnetInfo, TxStatus};
use subnet_cli::core::{
    content_id, Id, NodeId, OutputOwners, ShortId, TransferableOutput, Tx, TxKind, UnsignedTx,
    Utxo, UtxoId,
};
use subnet_cli::crypto::sha256;
use subnet_cli::localnet::{
    blockchain_log_path, ClusterControl, ClusterError, ClusterInfo, NodeInfo,
};

pub const AVAX: u64 = 1_000_000_000;

pub const LOCAL_NETWORK_ID: u32 = 1337;

pub fn avax_asset_id() -> Id {
    content_id(b"AVAX")
}

/// Node ids are derived from the URI host so they survive port changes
pub fn node_id_for_host(host: &str) -> NodeId {
    let digest = sha256(host.as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    NodeId::from_slice(&bytes)
}

fn host_of(uri: &str) -> &str {
    let rest = uri.split_once("://").map(|(_, r)| r).unwrap_or(uri);
    rest.split([':', '/']).next().unwrap_or(rest)
}

// ----------------------------------------------------------------------------
// P-Chain
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct NetworkState {
    pub utxos: Vec<Utxo>,
    pub subnets: BTreeMap<Id, SubnetInfo>,
    pub validators: BTreeMap<Id, Vec<NodeId>>,
    pub committed: BTreeMap<Id, Tx>,
    /// Endpoint each tx was issued through, in issue order
    pub issued_via: Vec<(String, Id)>,
    pub connected: Vec<String>,
    pub utxo_fetches: usize,
    /// Directories that receive `<blockchain id>.log` on chain creation
    pub log_dirs: Vec<PathBuf>,
    pub write_chain_logs: bool,
    /// Kinds the node refuses at issue time
    pub reject_kinds: Vec<TxKind>,
    /// Kinds the node accepts for issue and later reports as dropped
    pub drop_kinds: Vec<TxKind>,
    /// Kinds that stay processing forever
    pub stall_kinds: Vec<TxKind>,
    /// Kind of every tx that reached the node, in issue order
    pub issued_kinds: Vec<TxKind>,
    pub statuses: BTreeMap<Id, TxStatus>,
}

/// Shared P-Chain state reachable through any endpoint
#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        let network = Self::default();
        network.state().write_chain_logs = true;
        network
    }

    pub fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Give `owner` one UTXO worth `amount`
    pub fn fund(&self, owner: ShortId, amount: u64) {
        let mut state = self.state();
        let index = state.utxos.len() as u32;
        state.utxos.push(Utxo {
            utxo_id: UtxoId {
                tx_id: content_id(&owner.as_ref().to_vec()),
                output_index: index,
            },
            output: TransferableOutput {
                asset_id: avax_asset_id(),
                amount,
                owners: OutputOwners::new(1, vec![owner]),
            },
        });
    }

    /// Register a permissioned subnet; returns its control keys in the
    /// order the node reports them
    pub fn add_subnet(
        &self,
        subnet_id: Id,
        control_keys: Vec<ShortId>,
        threshold: u32,
    ) -> Vec<ShortId> {
        let owners = OutputOwners::new(threshold, control_keys);
        self.state().subnets.insert(
            subnet_id,
            SubnetInfo {
                is_permissioned: true,
                control_keys: owners.addrs.clone(),
                threshold,
            },
        );
        owners.addrs
    }

    pub fn add_validator(&self, subnet_id: Id, node_id: NodeId) {
        self.state()
            .validators
            .entry(subnet_id)
            .or_default()
            .push(node_id);
    }

    pub fn issued_count(&self) -> usize {
        self.state().issued_via.len()
    }

    pub fn reject(&self, kind: TxKind) {
        self.state().reject_kinds.push(kind);
    }

    pub fn drop_tx(&self, kind: TxKind) {
        self.state().drop_kinds.push(kind);
    }

    pub fn stall(&self, kind: TxKind) {
        self.state().stall_kinds.push(kind);
    }

    pub fn issued_kinds(&self) -> Vec<TxKind> {
        self.state().issued_kinds.clone()
    }
}

impl Connector for FakeNetwork {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn PlatformClient>, ClientError> {
        self.state().connected.push(endpoint.to_string());
        Ok(Arc::new(FakeClient {
            endpoint: endpoint.to_string(),
            network: self.clone(),
        }))
    }
}

pub struct FakeClient {
    endpoint: String,
    network: FakeNetwork,
}

#[async_trait]
impl PlatformClient for FakeClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_utxos(&self, addrs: &[ShortId]) -> Result<Vec<Utxo>, ClientError> {
        let mut state = self.network.state();
        state.utxo_fetches += 1;
        Ok(state
            .utxos
            .iter()
            .filter(|u| u.output.owners.addrs.iter().any(|a| addrs.contains(a)))
            .cloned()
            .collect())
    }

    async fn get_subnet(&self, subnet_id: Id) -> Result<SubnetInfo, ClientError> {
        self.network
            .state()
            .subnets
            .get(&subnet_id)
            .cloned()
            .ok_or(ClientError::Rpc {
                code: -32000,
                message: format!("subnet {} not found", subnet_id),
            })
    }

    async fn get_current_validators(&self, subnet_id: Id) -> Result<Vec<NodeId>, ClientError> {
        Ok(self
            .network
            .state()
            .validators
            .get(&subnet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn issue_tx(&self, tx_bytes: &[u8]) -> Result<Id, ClientError> {
        let tx = Tx::from_bytes(tx_bytes)?;
        let tx_id = tx.id();
        let kind = tx.kind();
        let mut state = self.network.state();

        if state.reject_kinds.contains(&kind) {
            return Err(ClientError::Rpc {
                code: -32000,
                message: format!("{:?} rejected: failed verification", kind),
            });
        }
        state.issued_kinds.push(kind);
        if state.drop_kinds.contains(&kind) {
            let reason = "failed to verify: insufficient funds".to_string();
            state.statuses.insert(tx_id, TxStatus::Dropped(reason));
            state.issued_via.push((self.endpoint.clone(), tx_id));
            return Ok(tx_id);
        }
        if state.stall_kinds.contains(&kind) {
            state.statuses.insert(tx_id, TxStatus::Processing);
            state.issued_via.push((self.endpoint.clone(), tx_id));
            return Ok(tx_id);
        }

        match &tx.unsigned {
            UnsignedTx::CreateSubnet(create) => {
                state.subnets.insert(
                    tx_id,
                    SubnetInfo {
                        is_permissioned: true,
                        control_keys: create.owner.addrs.clone(),
                        threshold: create.owner.threshold,
                    },
                );
            }
            UnsignedTx::AddValidator(add) => {
                state
                    .validators
                    .entry(Id::empty())
                    .or_default()
                    .push(add.validator.node_id);
            }
            UnsignedTx::AddSubnetValidator(add) => {
                state
                    .validators
                    .entry(add.subnet_id)
                    .or_default()
                    .push(add.validator.node_id);
            }
            UnsignedTx::CreateChain(_) if state.write_chain_logs => {
                for dir in &state.log_dirs {
                    std::fs::write(blockchain_log_path(dir, &tx_id), "").map_err(|e| {
                        ClientError::Rpc {
                            code: -1,
                            message: e.to_string(),
                        }
                    })?;
                }
            }
            _ => {}
        }

        state.issued_via.push((self.endpoint.clone(), tx_id));
        state.committed.insert(tx_id, tx);
        Ok(tx_id)
    }

    async fn get_tx_status(&self, tx_id: Id) -> Result<TxStatus, ClientError> {
        let state = self.network.state();
        if let Some(status) = state.statuses.get(&tx_id) {
            return Ok(status.clone());
        }
        Ok(if state.committed.contains_key(&tx_id) {
            TxStatus::Committed
        } else {
            TxStatus::Unknown
        })
    }

    async fn get_staking_asset_id(&self) -> Result<Id, ClientError> {
        Ok(avax_asset_id())
    }

    async fn get_network_id(&self) -> Result<u32, ClientError> {
        Ok(LOCAL_NETWORK_ID)
    }

    async fn get_node_id(&self) -> Result<NodeId, ClientError> {
        Ok(node_id_for_host(host_of(&self.endpoint)))
    }
}

// ----------------------------------------------------------------------------
// Cluster
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct ClusterState {
    pub nodes: BTreeMap<String, NodeInfo>,
    pub restart_counts: BTreeMap<String, u16>,
    /// (node name, whitelist) per restart, in order
    pub restarts: Vec<(String, String)>,
    pub unhealthy_after_restart: usize,
    unhealthy_checks: usize,
}

/// Cluster whose nodes get a new port on every restart. Log directories
/// live in a temp dir owned by the fake.
pub struct FakeCluster {
    state: Mutex<ClusterState>,
    log_root: TempDir,
}

impl FakeCluster {
    pub fn new(node_count: usize) -> Self {
        let log_root = tempfile::tempdir().unwrap();
        let mut nodes = BTreeMap::new();
        for i in 1..=node_count {
            let name = format!("node{}", i);
            let log_dir = log_root.path().join(&name);
            std::fs::create_dir_all(&log_dir).unwrap();
            let host = format!("{}.local", name);
            nodes.insert(
                name.clone(),
                NodeInfo {
                    name: name.clone(),
                    uri: format!("http://{}:9650", host),
                    id: node_id_for_host(&host).to_string(),
                    log_dir,
                    plugin_dir: PathBuf::new(),
                    whitelisted_subnets: String::new(),
                    config: "{}".to_string(),
                },
            );
        }

        Self {
            state: Mutex::new(ClusterState {
                nodes,
                ..Default::default()
            }),
            log_root,
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap()
    }

    pub fn log_dirs(&self) -> Vec<PathBuf> {
        self.state()
            .nodes
            .values()
            .map(|n| n.log_dir.clone())
            .collect()
    }

    pub fn node(&self, name: &str) -> NodeInfo {
        self.state().nodes[name].clone()
    }

    pub fn restarts(&self) -> Vec<(String, String)> {
        self.state().restarts.clone()
    }

    /// Point `network` at this cluster's log directories
    pub fn attach(&self, network: &FakeNetwork) {
        network.state().log_dirs = self.log_dirs();
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
    async fn health(&self) -> Result<(), ClusterError> {
        let mut state = self.state();
        if state.unhealthy_checks > 0 {
            state.unhealthy_checks -= 1;
            return Err(ClusterError::Unhealthy("node restarting".to_string()));
        }
        Ok(())
    }

    async fn uris(&self) -> Result<Vec<String>, ClusterError> {
        Ok(self.state().nodes.values().map(|n| n.uri.clone()).collect())
    }

    async fn status(&self) -> Result<ClusterInfo, ClusterError> {
        let state = self.state();
        Ok(ClusterInfo {
            node_infos: state.nodes.clone(),
            healthy: state.unhealthy_checks == 0,
        })
    }

    async fn restart_node(
        &self,
        name: &str,
        whitelisted_subnets: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state();
        let count = {
            let count = state.restart_counts.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let node = state
            .nodes
            .get_mut(name)
            .ok_or_else(|| ClusterError::UnknownNode(name.to_string()))?;
        node.uri = format!("http://{}.local:{}", name, 9650 + 10 * count);
        node.whitelisted_subnets = whitelisted_subnets.to_string();

        state
            .restarts
            .push((name.to_string(), whitelisted_subnets.to_string()));
        state.unhealthy_checks = state.unhealthy_after_restart;
        Ok(())
    }
}
