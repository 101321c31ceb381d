//! Cluster bootstrap sequencer
//!
//! Provisions custom VMs on an already running, healthy local cluster:
//!
//! 1. WalletSetup: bind the funded keychain to the first node URI and check
//!    the balance
//! 2. ValidatorCheck: add every node not yet validating the primary network
//! 3. SubnetCreation: one subnet per VM
//! 4. NodeRestart: whitelist the union of created subnets on every node,
//!    restarting nodes one at a time
//! 5. WalletRefresh: rebind the wallet to the post-restart URI
//! 6. SubnetValidatorEnrollment: every node validates every subnet
//! 7. BlockchainCreation: one blockchain per VM
//! 8. ReadinessWait: wait for each node's per-blockchain log file
//!
//! Phases run strictly in order. Any failure aborts the run; there is no
//! rollback and no resume, already issued transactions stay issued.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::cluster::{ClusterControl, ClusterError, NodeInfo};
use super::node_config::{merge_whitelist, whitelist_string, whitelist_subnets};
use super::readiness::{wait_for_blockchains, READINESS_POLL_INTERVAL};
use super::restart::{restart_nodes, RestartPlan};
use super::track::rpc_endpoint;
use super::vmid::{vm_id_from_name, VmIdError};
use crate::client::{ClientError, Connector};
use crate::core::{format_address, Id, IdError, NodeId, OutputOwners, Validator};
use crate::ux::print_to_user;
use crate::wallet::{Keychain, Wallet, WalletError, WalletOptions, NANO_AVAX_PER_AVAX};

const PRIMARY_VALIDATOR_START_DELAY: Duration = Duration::from_secs(10);
const PRIMARY_VALIDATOR_DURATION: Duration = Duration::from_secs(300 * 60 * 60);
const PRIMARY_VALIDATOR_WEIGHT: u64 = NANO_AVAX_PER_AVAX;
/// 10%, in shares of 1,000,000
const PRIMARY_DELEGATION_SHARES: u32 = 100_000;

const SUBNET_VALIDATOR_START_DELAY: Duration = Duration::from_secs(60);
const SUBNET_VALIDATOR_DURATION: Duration = Duration::from_secs(100 * 60 * 60);
const SUBNET_VALIDATOR_WEIGHT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    WalletSetup,
    ValidatorCheck,
    SubnetCreation,
    NodeRestart,
    WalletRefresh,
    SubnetValidatorEnrollment,
    BlockchainCreation,
    ReadinessWait,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::WalletSetup,
        Phase::ValidatorCheck,
        Phase::SubnetCreation,
        Phase::NodeRestart,
        Phase::WalletRefresh,
        Phase::SubnetValidatorEnrollment,
        Phase::BlockchainCreation,
        Phase::ReadinessWait,
    ];

    pub fn next(self) -> Option<Phase> {
        let index = Phase::ALL.iter().position(|p| *p == self)?;
        Phase::ALL.get(index + 1).copied()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::WalletSetup => "wallet setup",
            Phase::ValidatorCheck => "validator check",
            Phase::SubnetCreation => "subnet creation",
            Phase::NodeRestart => "node restart",
            Phase::WalletRefresh => "wallet refresh",
            Phase::SubnetValidatorEnrollment => "subnet validator enrollment",
            Phase::BlockchainCreation => "blockchain creation",
            Phase::ReadinessWait => "readiness wait",
        };
        f.write_str(name)
    }
}

/// Failure of a single step inside a phase
#[derive(Error, Debug)]
pub enum StepError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    VmName(#[from] VmIdError),
    #[error(transparent)]
    Address(#[from] IdError),
}

impl StepError {
    pub fn is_timeout(&self) -> bool {
        match self {
            StepError::Wallet(e) => e.is_timeout(),
            StepError::Client(e) => e.is_timeout(),
            StepError::Cluster(e) => e.is_timeout(),
            StepError::VmName(_) | StepError::Address(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("not enough AVAX balance {balance} in {address}, need at least {required}")]
    InsufficientFunds {
        address: String,
        balance: u64,
        required: u64,
    },
    #[error("no custom VMs to install")]
    NoVms,
    #[error("{phase} deadline passed after {waited:?}")]
    Timeout { phase: Phase, waited: Duration },
    #[error("{phase} failed for {target}: {source}")]
    InPhase {
        phase: Phase,
        target: String,
        #[source]
        source: StepError,
    },
}

impl BootstrapError {
    /// Deadline expiry anywhere in the chain, as opposed to a fatal failure
    pub fn is_timeout(&self) -> bool {
        match self {
            BootstrapError::Timeout { .. } => true,
            BootstrapError::InPhase { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            BootstrapError::InsufficientFunds { .. } | BootstrapError::NoVms => Phase::WalletSetup,
            BootstrapError::Timeout { phase, .. } | BootstrapError::InPhase { phase, .. } => *phase,
        }
    }
}

/// Run `step` under the overall deadline, attributing failures to
/// `phase` and `target`
async fn within<T, E, F>(
    phase: Phase,
    target: &str,
    started: Instant,
    deadline: Instant,
    step: F,
) -> Result<T, BootstrapError>
where
    E: Into<StepError>,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout_at(deadline, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(BootstrapError::InPhase {
            phase,
            target: target.to_string(),
            source: source.into(),
        }),
        Err(_) => Err(BootstrapError::Timeout {
            phase,
            waited: started.elapsed(),
        }),
    }
}

fn unix_after(delay: Duration) -> u64 {
    (chrono::Utc::now().timestamp().max(0) as u64).saturating_add(delay.as_secs())
}

/// One custom VM to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSpec {
    pub name: String,
    pub genesis: Vec<u8>,
}

/// Ids collected for one VM as the run progresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmState {
    pub vm_id: Id,
    pub subnet_id: Option<Id>,
    pub blockchain_id: Option<Id>,
    genesis: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub wallet: WalletOptions,
    pub min_balance: u64,
    pub readiness_interval: Duration,
}

impl BootstrapOptions {
    pub fn new(wallet: WalletOptions) -> Self {
        Self {
            wallet,
            min_balance: NANO_AVAX_PER_AVAX,
            readiness_interval: READINESS_POLL_INTERVAL,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub vms: BTreeMap<String, VmState>,
    /// Node name to post-restart URI
    pub node_uris: BTreeMap<String, String>,
    pub rpc_endpoints: Vec<String>,
    pub remaining_balance: u64,
    pub completed: Vec<Phase>,
}

pub struct BootstrapSequencer {
    cluster: Arc<dyn ClusterControl>,
    connector: Arc<dyn Connector>,
    keychain: Keychain,
    options: BootstrapOptions,
    vms: BTreeMap<String, VmState>,
    nodes: BTreeMap<String, NodeInfo>,
    node_ids: BTreeMap<String, NodeId>,
    wallet: Option<Wallet>,
    completed: Vec<Phase>,
    started: Instant,
    deadline: Instant,
}

impl BootstrapSequencer {
    pub fn new(
        cluster: Arc<dyn ClusterControl>,
        connector: Arc<dyn Connector>,
        keychain: Keychain,
        vms: Vec<VmSpec>,
        options: BootstrapOptions,
    ) -> Result<Self, BootstrapError> {
        if vms.is_empty() {
            return Err(BootstrapError::NoVms);
        }
        let mut states = BTreeMap::new();
        for vm in vms {
            let vm_id = vm_id_from_name(&vm.name).map_err(|e| BootstrapError::InPhase {
                phase: Phase::WalletSetup,
                target: vm.name.clone(),
                source: e.into(),
            })?;
            states.insert(
                vm.name,
                VmState {
                    vm_id,
                    subnet_id: None,
                    blockchain_id: None,
                    genesis: vm.genesis,
                },
            );
        }

        let now = Instant::now();
        Ok(Self {
            cluster,
            connector,
            keychain,
            options,
            vms: states,
            nodes: BTreeMap::new(),
            node_ids: BTreeMap::new(),
            wallet: None,
            completed: Vec::new(),
            started: now,
            deadline: now,
        })
    }

    pub fn completed(&self) -> &[Phase] {
        &self.completed
    }

    /// Drive all phases in order, failing once `deadline` passes
    pub async fn run(mut self, deadline: Instant) -> Result<BootstrapReport, BootstrapError> {
        self.started = Instant::now();
        self.deadline = deadline;
        print_to_user("create and install custom VMs");

        for phase in Phase::ALL {
            self.run_phase(phase).await?;
            self.completed.push(phase);
            log::info!("bootstrap phase {} complete", phase);
        }
        self.report().await
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<(), BootstrapError> {
        match phase {
            Phase::WalletSetup => self.setup_wallet().await,
            Phase::ValidatorCheck => self.check_validators().await,
            Phase::SubnetCreation => self.create_subnets().await,
            Phase::NodeRestart => self.restart_with_whitelist().await,
            Phase::WalletRefresh => self.refresh_wallet().await,
            Phase::SubnetValidatorEnrollment => self.add_subnet_validators().await,
            Phase::BlockchainCreation => self.create_blockchains().await,
            Phase::ReadinessWait => self.wait_ready().await,
        }
    }

    fn wallet_mut(&mut self, phase: Phase) -> Result<&mut Wallet, BootstrapError> {
        self.wallet.as_mut().ok_or(BootstrapError::InPhase {
            phase,
            target: "wallet".to_string(),
            source: StepError::Wallet(WalletError::EmptyKeychain),
        })
    }

    async fn setup_wallet(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::WalletSetup;
        print_to_user("setting up the base wallet with the seed test key");
        let (started, deadline) = (self.started, self.deadline);
        let cluster = Arc::clone(&self.cluster);

        let info = within(phase, "cluster", started, deadline, async {
            let info = cluster.status().await?;
            if info.node_infos.is_empty() {
                return Err(ClusterError::NoNodes);
            }
            Ok::<_, ClusterError>(info)
        })
        .await?;
        self.nodes = info.node_infos;

        let uris = within(phase, "cluster", started, deadline, cluster.uris()).await?;
        let endpoint = uris.first().cloned().ok_or(BootstrapError::InPhase {
            phase,
            target: "cluster".to_string(),
            source: ClusterError::NoNodes.into(),
        })?;

        let connector = Arc::clone(&self.connector);
        let keychain = self.keychain.clone();
        let options = self.options.wallet.clone();
        let bind = Wallet::bind(connector, &endpoint, keychain, options);
        let wallet = within(phase, &endpoint, started, deadline, bind).await?;

        let address = format_address(&wallet.change_address(), self.options.wallet.network_id)
            .map_err(|e| BootstrapError::InPhase {
                phase,
                target: endpoint.clone(),
                source: e.into(),
            })?;
        log::info!("set up base wallet at {} with address {}", endpoint, address);

        print_to_user(
            "check if the seed test key has enough balance to create validators and subnets",
        );
        let balance = wallet.balance();
        if balance < self.options.min_balance {
            return Err(BootstrapError::InsufficientFunds {
                address,
                balance,
                required: self.options.min_balance,
            });
        }
        log::info!("fetched base wallet AVAX balance {} for {}", balance, address);
        self.wallet = Some(wallet);
        Ok(())
    }

    async fn check_validators(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::ValidatorCheck;
        print_to_user(
            "fetching all nodes from the existing cluster to make sure all nodes are validating the primary network",
        );
        let (started, deadline) = (self.started, self.deadline);

        let mut node_ids = BTreeMap::new();
        for (name, node) in &self.nodes {
            let connector = Arc::clone(&self.connector);
            let node_id = within(phase, name, started, deadline, async {
                connector.connect(&node.uri)?.get_node_id().await
            })
            .await?;
            node_ids.insert(name.clone(), node_id);
        }
        self.node_ids = node_ids.clone();

        let client = self.wallet_mut(phase)?.client();
        let query = client.get_current_validators(Id::empty());
        let current = within(phase, "primary network", started, deadline, query).await?;
        for node_id in &current {
            log::info!("current validator {}", node_id);
        }

        print_to_user("adding all nodes as validator for the primary network");
        for (name, node_id) in node_ids {
            if current.contains(&node_id) {
                log::info!(
                    "node {} ({}) is already validating the primary network; skipping",
                    name,
                    node_id
                );
                continue;
            }

            log::info!("adding node {} ({}) as a primary network validator", name, node_id);
            let wallet = self.wallet_mut(phase)?;
            let rewards_owner = OutputOwners::new(1, vec![wallet.change_address()]);
            let validator = Validator {
                node_id,
                start: unix_after(PRIMARY_VALIDATOR_START_DELAY),
                end: unix_after(PRIMARY_VALIDATOR_DURATION),
                weight: PRIMARY_VALIDATOR_WEIGHT,
            };
            let issue =
                wallet.issue_add_validator_tx(validator, rewards_owner, PRIMARY_DELEGATION_SHARES);
            let tx_id = within(phase, &name, started, deadline, issue).await?;
            log::info!("added node {} as primary network validator in tx {}", name, tx_id);
        }
        Ok(())
    }

    async fn create_subnets(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::SubnetCreation;
        print_to_user("creating subnet for each custom VM");
        let (started, deadline) = (self.started, self.deadline);

        let pending: Vec<String> = self
            .vms
            .iter()
            .filter(|(_, vm)| vm.subnet_id.is_none())
            .map(|(name, _)| name.clone())
            .collect();
        for name in pending {
            let wallet = self.wallet_mut(phase)?;
            let owner = OutputOwners::new(1, vec![wallet.change_address()]);
            let issue = wallet.issue_create_subnet_tx(owner);
            let subnet_id = within(phase, &name, started, deadline, issue).await?;

            log::info!("created subnet {} for vm {}", subnet_id, name);
            if let Some(vm) = self.vms.get_mut(&name) {
                vm.subnet_id = Some(subnet_id);
            }
        }
        Ok(())
    }

    /// Every subnet created so far
    fn subnet_ids(&self) -> Vec<Id> {
        self.vms.values().filter_map(|vm| vm.subnet_id).collect()
    }

    async fn restart_with_whitelist(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::NodeRestart;
        print_to_user("restarting each node with --whitelisted-subnets");
        let (started, deadline) = (self.started, self.deadline);
        let subnet_ids = self.subnet_ids();
        log::info!("whitelisting subnets {}", whitelist_string(&subnet_ids));

        let mut plans = Vec::with_capacity(self.nodes.len());
        for (name, node) in self.nodes.iter_mut() {
            let updated = merge_whitelist(&node.whitelisted_subnets, &subnet_ids)
                .and_then(|whitelist| {
                    whitelist_subnets(&node.config, &subnet_ids).map(|config| (whitelist, config))
                });
            let (whitelist, config) = updated.map_err(|e| BootstrapError::InPhase {
                phase,
                target: name.clone(),
                source: e.into(),
            })?;
            log::info!("updating node {} whitelisted-subnets to {}", name, whitelist);
            node.whitelisted_subnets = whitelist.clone();
            node.config = config;
            plans.push(RestartPlan {
                name: name.clone(),
                whitelisted_subnets: whitelist,
            });
        }

        for plan in &plans {
            let cluster = Arc::clone(&self.cluster);
            let restart = restart_nodes(cluster.as_ref(), std::slice::from_ref(plan), deadline);
            within(phase, &plan.name, started, deadline, restart).await?;
        }
        Ok(())
    }

    async fn refresh_wallet(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::WalletRefresh;
        print_to_user("refreshing the wallet with the new URIs after restarts");
        let (started, deadline) = (self.started, self.deadline);
        let cluster = Arc::clone(&self.cluster);

        let info = within(phase, "cluster", started, deadline, cluster.status()).await?;
        for (name, fresh) in info.node_infos {
            if let Some(node) = self.nodes.get_mut(&name) {
                node.uri = fresh.uri;
                node.log_dir = fresh.log_dir;
            }
        }

        let uris = within(phase, "cluster", started, deadline, cluster.uris()).await?;
        let endpoint = uris.first().cloned().ok_or(BootstrapError::InPhase {
            phase,
            target: "cluster".to_string(),
            source: ClusterError::NoNodes.into(),
        })?;

        self.wallet_mut(phase)?
            .rebind(&endpoint)
            .map_err(|e| BootstrapError::InPhase {
                phase,
                target: endpoint.clone(),
                source: e.into(),
            })?;
        log::info!("base wallet now bound to {}", endpoint);
        Ok(())
    }

    async fn add_subnet_validators(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::SubnetValidatorEnrollment;
        print_to_user("adding all nodes as subnet validator for each subnet");
        let (started, deadline) = (self.started, self.deadline);

        let subnets: Vec<(String, Id)> = self
            .vms
            .iter()
            .filter_map(|(name, vm)| vm.subnet_id.map(|id| (name.clone(), id)))
            .collect();
        let node_ids = self.node_ids.clone();

        for (vm_name, subnet_id) in subnets {
            for (node_name, node_id) in &node_ids {
                let validator = Validator {
                    node_id: *node_id,
                    start: unix_after(SUBNET_VALIDATOR_START_DELAY),
                    end: unix_after(SUBNET_VALIDATOR_DURATION),
                    weight: SUBNET_VALIDATOR_WEIGHT,
                };
                let target = format!("{} on {}", node_name, vm_name);
                let wallet = self.wallet_mut(phase)?;
                let issue = wallet.issue_add_subnet_validator_tx(validator, subnet_id);
                let tx_id = within(phase, &target, started, deadline, issue).await?;
                log::info!(
                    "added node {} as validator of subnet {} (vm {}) in tx {}",
                    node_name,
                    subnet_id,
                    vm_name,
                    tx_id
                );
            }
        }
        Ok(())
    }

    async fn create_blockchains(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::BlockchainCreation;
        print_to_user("creating blockchain for each custom VM");
        let (started, deadline) = (self.started, self.deadline);

        let pending: Vec<(String, VmState)> = self
            .vms
            .iter()
            .filter(|(_, vm)| vm.blockchain_id.is_none())
            .map(|(name, vm)| (name.clone(), vm.clone()))
            .collect();
        for (name, vm) in pending {
            let subnet_id = vm.subnet_id.ok_or(BootstrapError::InPhase {
                phase,
                target: name.clone(),
                source: ClusterError::Malformed {
                    call: "subnet creation",
                    detail: "vm has no subnet".to_string(),
                }
                .into(),
            })?;
            log::info!(
                "creating blockchain for vm {} ({}) with {} genesis bytes",
                name,
                vm.vm_id,
                vm.genesis.len()
            );
            let wallet = self.wallet_mut(phase)?;
            let issue =
                wallet.issue_create_chain_tx(subnet_id, vm.genesis, vm.vm_id, Vec::new(), &name);
            let blockchain_id = within(phase, &name, started, deadline, issue).await?;

            log::info!("created blockchain {} for vm {}", blockchain_id, name);
            if let Some(state) = self.vms.get_mut(&name) {
                state.blockchain_id = Some(blockchain_id);
            }
        }
        Ok(())
    }

    async fn wait_ready(&mut self) -> Result<(), BootstrapError> {
        let phase = Phase::ReadinessWait;
        print_to_user("waiting for custom VMs to report healthy...");
        let (started, deadline) = (self.started, self.deadline);
        let blockchains: Vec<Id> = self.vms.values().filter_map(|vm| vm.blockchain_id).collect();
        let interval = self.options.readiness_interval;
        let nodes = &self.nodes;

        let ready = wait_for_blockchains(nodes.values(), &blockchains, interval, deadline);
        within(phase, "blockchain logs", started, deadline, ready).await?;
        print_to_user("all custom VMs are running!!!");
        Ok(())
    }

    async fn report(self) -> Result<BootstrapReport, BootstrapError> {
        let node_uris: BTreeMap<String, String> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.uri.clone()))
            .collect();

        let mut rpc_endpoints = Vec::new();
        for uri in node_uris.values() {
            for (name, vm) in &self.vms {
                if let Some(blockchain_id) = vm.blockchain_id {
                    let endpoint = rpc_endpoint(uri, &blockchain_id);
                    print_to_user(&format!("[blockchain RPC for {:?}] {}", name, endpoint));
                    rpc_endpoints.push(endpoint);
                }
            }
        }

        let remaining_balance = self.wallet.as_ref().map(Wallet::balance).unwrap_or_default();
        print_to_user(&format!(
            "remaining balance of the base wallet: {} nAVAX",
            remaining_balance
        ));

        Ok(BootstrapReport {
            vms: self.vms,
            node_uris,
            rpc_endpoints,
            remaining_balance,
            completed: self.completed,
        })
    }
}
