//! CLI commands for subnet-cli
//!
//! Implements all command handlers for the CLI interface. Handlers that
//! touch a node are async and run on the runtime `main` builds.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::time::Instant;

use crate::client::{Connector, HttpConnector, SubnetInfo};
use crate::config::{AppConfig, KEYS_DIR, SUBNETS_DIR};
use crate::core::{
    format_address, parse_address, Id, Network, NodeId, ShortId, UnsignedTx, Validator,
};
use crate::crypto::KeyPair;
use crate::localnet::{
    rpc_endpoint, track_blockchain, vm_id_from_name, BootstrapOptions, BootstrapSequencer,
    ClusterControl, RunnerClient, VmSpec,
};
use crate::multisig::{
    DeployOutcome, MultisigCoordinator, MultisigError, PublicDeployer, SignOutcome, SignerSet,
    TxArtifact,
};
use crate::storage::SidecarStore;
use crate::ux::{print_to_user, WaitIndicator};
use crate::wallet::{Keychain, KeyStore, Signer, Wallet};

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const SUBNET_VALIDATOR_START_DELAY: Duration = Duration::from_secs(60);
const SECS_PER_HOUR: u64 = 3600;

/// Everything a handler needs, built once per invocation
pub struct AppContext {
    pub base_dir: PathBuf,
    pub config: AppConfig,
    pub keys: KeyStore,
    pub sidecars: SidecarStore,
    connector: Arc<dyn Connector>,
    cluster: Option<Arc<dyn ClusterControl>>,
}

impl AppContext {
    /// Load `config.json` from `base_dir` and talk to nodes over HTTP
    pub fn new(base_dir: PathBuf) -> CliResult<Self> {
        let config = AppConfig::load(&base_dir)?;
        let connector = Arc::new(HttpConnector::new(
            config.dial_timeout(),
            config.request_timeout(),
        ));
        Self::with_connector(base_dir, config, connector)
    }

    pub fn with_connector(
        base_dir: PathBuf,
        config: AppConfig,
        connector: Arc<dyn Connector>,
    ) -> CliResult<Self> {
        fs::create_dir_all(&base_dir)?;
        let keys = KeyStore::new(&base_dir.join(KEYS_DIR))?;
        let sidecars = SidecarStore::new(&base_dir.join(SUBNETS_DIR))?;

        Ok(Self {
            base_dir,
            config,
            keys,
            sidecars,
            connector,
            cluster: None,
        })
    }

    /// Drive `cluster` instead of the network-runner gateway
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterControl>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::clone(&self.connector)
    }

    pub fn cluster(&self) -> CliResult<Arc<dyn ClusterControl>> {
        if let Some(cluster) = &self.cluster {
            return Ok(Arc::clone(cluster));
        }
        Ok(Arc::new(RunnerClient::new(
            &self.config.runner_endpoint,
            self.config.dial_timeout(),
            self.config.request_timeout(),
        )?))
    }

    /// Keychain holding the stored key `name`. Stored keys never sign on
    /// Mainnet.
    pub fn keychain(&self, name: &str, network: Network) -> CliResult<Keychain> {
        if network == Network::Mainnet {
            return Err(format!(
                "stored keys cannot be used on {}; a hardware wallet is required",
                network.name()
            )
            .into());
        }
        Ok(Keychain::from_keys([self.keys.load(name)?]))
    }

    pub async fn bind_wallet(&self, network: Network, keychain: Keychain) -> CliResult<Wallet> {
        let endpoint = self.config.endpoint(network);
        log::info!("binding wallet to {} at {}", network.name(), endpoint);
        Ok(Wallet::bind(
            self.connector(),
            endpoint,
            keychain,
            self.config.wallet_options(network),
        )
        .await?)
    }
}

/// Parse a `NAME=GENESIS_FILE` pair
pub fn parse_vm_arg(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=GENESIS_FILE, got {:?}", s)),
    }
}

fn parse_addresses(addresses: &[String]) -> CliResult<Vec<ShortId>> {
    let mut parsed = Vec::with_capacity(addresses.len());
    for address in addresses {
        parsed.push(parse_address(address)?);
    }
    Ok(parsed)
}

/// The requested auth keys, or when none are given the subnet's control
/// keys up to its threshold, preferring keys this wallet holds
fn select_auth_keys(
    requested: &[String],
    info: &SubnetInfo,
    keychain: &Keychain,
) -> CliResult<Vec<ShortId>> {
    if !requested.is_empty() {
        return parse_addresses(requested);
    }
    let (mut chosen, others): (Vec<ShortId>, Vec<ShortId>) = info
        .control_keys
        .iter()
        .cloned()
        .partition(|addr| keychain.contains(addr));
    chosen.extend(others);
    chosen.truncate(info.threshold as usize);
    Ok(chosen)
}

fn timeout_or(timeout_secs: Option<u64>, default: Duration) -> Duration {
    timeout_secs.map(Duration::from_secs).unwrap_or(default)
}

fn unix_after(delay: Duration) -> u64 {
    (chrono::Utc::now().timestamp().max(0) as u64).saturating_add(delay.as_secs())
}

fn print_signing_status(
    chain: &str,
    tx_path: &Path,
    set: &SignerSet,
    network_id: u32,
) -> CliResult<()> {
    if set.is_complete() {
        print_to_user("Tx is fully signed, and ready to be committed");
        print_to_user("");
        print_to_user("Commit command:");
        print_to_user(&format!(
            "  subnet-cli transaction commit {} --input-tx-filepath {}",
            chain,
            tx_path.display()
        ));
        return Ok(());
    }

    print_to_user("Addresses remaining to sign the tx");
    for addr in set.remaining() {
        print_to_user(&format!("  {}", format_address(addr, network_id)?));
    }
    print_to_user("");
    print_to_user("Signing command:");
    print_to_user(&format!(
        "  subnet-cli transaction sign {} --input-tx-filepath {} --key <key name>",
        chain,
        tx_path.display()
    ));
    Ok(())
}

fn save_partially_signed(
    artifact: &TxArtifact,
    chain: &str,
    tx_path: &Path,
    set: &SignerSet,
) -> CliResult<()> {
    print_to_user(&format!(
        "{} of {} required Tx signatures have been signed. Saving tx to disk to enable remaining signing.",
        set.signed_count(),
        set.required().len()
    ));
    artifact.save(tx_path)?;
    print_to_user("");
    print_signing_status(chain, tx_path, set, artifact.tx().unsigned.network_id())
}

/// Record a committed blockchain in its sidecar; on Local also track it
async fn record_blockchain(
    ctx: &AppContext,
    name: &str,
    vm: &str,
    network: Network,
    subnet_id: Id,
    blockchain_id: Id,
) -> CliResult<()> {
    let mut sidecar = ctx.sidecars.load_or_new(name, vm)?;
    sidecar.set_subnet_id(network, subnet_id);
    sidecar.set_blockchain_id(network, blockchain_id);
    ctx.sidecars.save(&sidecar)?;
    log::info!("recorded {} as blockchain {} on {}", name, blockchain_id, network);

    if network == Network::Local {
        track(ctx, name, None).await?;
    }
    Ok(())
}

async fn track(ctx: &AppContext, name: &str, timeout_secs: Option<u64>) -> CliResult<Vec<String>> {
    let cluster = ctx.cluster()?;
    let deadline = Instant::now() + timeout_or(timeout_secs, ctx.config.bootstrap_timeout());
    let endpoints = track_blockchain(
        cluster.as_ref(),
        &ctx.sidecars,
        name,
        ctx.config.readiness_interval(),
        deadline,
    )
    .await?;
    for endpoint in &endpoints {
        print_to_user(&format!("[blockchain RPC for {:?}] {}", name, endpoint));
    }
    Ok(endpoints)
}

// ----------------------------------------------------------------------------
// Keys
// ----------------------------------------------------------------------------

/// Create a stored key, generated or imported from a hex key file
pub fn cmd_key_create(ctx: &AppContext, name: &str, file: Option<&Path>) -> CliResult<()> {
    if ctx.keys.exists(name) {
        println!("⚠️  Key {:?} already exists", name);
        println!("   Pick another name or delete the existing key first");
        return Ok(());
    }

    let info = match file {
        Some(path) => ctx.keys.import_file(name, path)?,
        None => ctx.keys.create(name)?,
    };

    println!("🔐 Key created!");
    println!("   🏷️  Name: {}", info.name);
    println!(
        "   📍 Address (Fuji): {}",
        format_address(&info.address, Network::Testnet.network_id())?
    );
    println!(
        "   📍 Address (Local): {}",
        format_address(&info.address, Network::Local.network_id())?
    );
    println!("\n   ⚠️  IMPORTANT: The private key is stored unencrypted in the keys directory.");
    println!("   Stored keys are refused on Mainnet.");

    Ok(())
}

/// List stored keys
pub fn cmd_key_list(ctx: &AppContext) -> CliResult<()> {
    let keys = ctx.keys.list()?;

    if keys.is_empty() {
        println!("📭 No keys found. Create one with: subnet-cli key create <name>");
        return Ok(());
    }

    println!("📋 Keys:");
    for key in &keys {
        let address = format_address(&key.address, Network::Testnet.network_id())?;
        println!("   {} - {}", key.name, address);
    }

    Ok(())
}

// ----------------------------------------------------------------------------
// Multisig transactions
// ----------------------------------------------------------------------------

/// Add the stored key's signatures to a partially signed tx file
pub async fn cmd_transaction_sign(
    ctx: &AppContext,
    blockchain: Option<&str>,
    tx_path: &Path,
    key_name: &str,
) -> CliResult<()> {
    let mut artifact = TxArtifact::load(tx_path)?;
    let network = artifact.network()?;
    let chain = blockchain.unwrap_or("<blockchain>");
    println!("📂 Loaded {} for {}", artifact.display_name(), network.name());

    let keychain = ctx.keychain(key_name, network)?;
    let coordinator = MultisigCoordinator::new(ctx.bind_wallet(network, keychain).await?);
    let control_keys = coordinator.control_keys_for(&artifact).await?;

    let set = coordinator.remaining_signers(&artifact, &control_keys)?;
    if set.is_complete() {
        return Err(MultisigError::AlreadyFullySigned.into());
    }
    let subnet_id = artifact
        .subnet_id()
        .ok_or(MultisigError::MissingSubnetId)?;

    match coordinator
        .sign(&mut artifact, set.remaining(), subnet_id)
        .await
    {
        Ok(SignOutcome::Signed { added }) => {
            for addr in &added {
                let address = format_address(addr, network.network_id())?;
                log::info!("signed {} with {}", artifact.display_name(), address);
            }
        }
        Ok(SignOutcome::AlreadySigned) => {
            println!("⚠️  This key has already signed the tx");
            return print_signing_status(chain, tx_path, &set, network.network_id());
        }
        Err(MultisigError::NoSubnetAuthKeyInWallet { expected }) => {
            print_to_user("There are no required subnet auth keys present in the wallet");
            print_to_user("");
            print_to_user("Expected one of:");
            for addr in &expected {
                print_to_user(&format!("  {}", format_address(addr, network.network_id())?));
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let set = coordinator.remaining_signers(&artifact, &control_keys)?;
    save_partially_signed(&artifact, chain, tx_path, &set)
}

/// Issue a fully signed tx file
pub async fn cmd_transaction_commit(
    ctx: &AppContext,
    blockchain: &str,
    tx_path: &Path,
) -> CliResult<()> {
    let mut artifact = TxArtifact::load(tx_path)?;
    let network = artifact.network()?;

    // Issuing a signed tx spends nothing, so any key can bind the wallet
    let keychain = Keychain::from_keys([KeyPair::generate()?]);
    let mut coordinator = MultisigCoordinator::new(ctx.bind_wallet(network, keychain).await?);

    let tx_id = coordinator.commit(&mut artifact).await?;
    print_to_user(&format!("Transaction successful, transaction ID: {}", tx_id));

    if let UnsignedTx::CreateChain(tx) = &artifact.tx().unsigned {
        record_blockchain(
            ctx,
            blockchain,
            &tx.vm_id.to_string(),
            network,
            tx.subnet_id,
            tx_id,
        )
        .await?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Blockchains
// ----------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Blockchain name
    pub name: String,

    /// Genesis file
    #[arg(long)]
    pub genesis: PathBuf,

    /// Subnet to deploy into
    #[arg(long)]
    pub subnet_id: Id,

    /// VM name the blockchain runs (defaults to the blockchain name)
    #[arg(long)]
    pub vm: Option<String>,

    /// Stored key paying for and signing the tx
    #[arg(short, long)]
    pub key: String,

    /// Subnet control keys that will authorize the tx (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub auth_keys: Vec<String>,

    /// local, testnet or mainnet
    #[arg(long, default_value = "local")]
    pub network: Network,

    /// Where to save the tx when more signatures are needed
    #[arg(long)]
    pub output_tx_path: Option<PathBuf>,
}

/// Create a blockchain on a permissioned subnet
pub async fn cmd_blockchain_deploy(ctx: &AppContext, args: &DeployArgs) -> CliResult<()> {
    let vm = args.vm.as_deref().unwrap_or(&args.name);
    let vm_id = vm_id_from_name(vm)?;
    let genesis = fs::read(&args.genesis)?;

    let keychain = ctx.keychain(&args.key, args.network)?;
    let mut deployer = PublicDeployer::new(ctx.bind_wallet(args.network, keychain).await?);
    let info = deployer.coordinator().get_owners(args.subnet_id).await?;
    let auth_keys = select_auth_keys(
        &args.auth_keys,
        &info,
        deployer.coordinator().wallet().keychain(),
    )?;

    println!("🚀 Deploying {} (VM {}) to subnet {}", args.name, vm_id, args.subnet_id);
    let outcome = deployer
        .deploy_blockchain(args.subnet_id, &auth_keys, &args.name, vm_id, genesis)
        .await?;

    match outcome {
        DeployOutcome::Committed(blockchain_id) => {
            print_to_user(&format!(
                "Transaction successful, transaction ID: {}",
                blockchain_id
            ));
            record_blockchain(ctx, &args.name, vm, args.network, args.subnet_id, blockchain_id)
                .await
        }
        DeployOutcome::PartiallySigned(artifact) => {
            let mut sidecar = ctx.sidecars.load_or_new(&args.name, vm)?;
            sidecar.set_subnet_id(args.network, args.subnet_id);
            ctx.sidecars.save(&sidecar)?;

            let tx_path = args
                .output_tx_path
                .as_deref()
                .ok_or("the tx needs more signatures; pass --output-tx-path to save it")?;
            let set = artifact.signer_set(&info.control_keys)?;
            save_partially_signed(&artifact, &args.name, tx_path, &set)
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddValidatorArgs {
    /// Blockchain name whose subnet gains the validator
    pub name: String,

    /// Node to enroll
    #[arg(long)]
    pub node_id: NodeId,

    /// Validator weight
    #[arg(long, default_value = "1000")]
    pub weight: u64,

    /// Validation period in hours
    #[arg(long, default_value = "100")]
    pub duration_hours: u64,

    /// Subnet id (defaults to the one recorded for this blockchain)
    #[arg(long)]
    pub subnet_id: Option<Id>,

    /// Stored key paying for and signing the tx
    #[arg(short, long)]
    pub key: String,

    /// Subnet control keys that will authorize the tx (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub auth_keys: Vec<String>,

    /// local, testnet or mainnet
    #[arg(long, default_value = "local")]
    pub network: Network,

    /// Where to save the tx when more signatures are needed
    #[arg(long)]
    pub output_tx_path: Option<PathBuf>,
}

/// Add a validator to the blockchain's subnet
pub async fn cmd_blockchain_add_validator(
    ctx: &AppContext,
    args: &AddValidatorArgs,
) -> CliResult<()> {
    let subnet_id = match args.subnet_id {
        Some(id) => id,
        None => ctx
            .sidecars
            .load(&args.name)?
            .network(args.network)
            .and_then(|data| data.subnet_id)
            .ok_or_else(|| {
                format!(
                    "no subnet recorded for {} on {}; pass --subnet-id",
                    args.name,
                    args.network.name()
                )
            })?,
    };

    let keychain = ctx.keychain(&args.key, args.network)?;
    let mut deployer = PublicDeployer::new(ctx.bind_wallet(args.network, keychain).await?);
    let info = deployer.coordinator().get_owners(subnet_id).await?;
    let auth_keys = select_auth_keys(
        &args.auth_keys,
        &info,
        deployer.coordinator().wallet().keychain(),
    )?;

    let validator = Validator {
        node_id: args.node_id,
        start: unix_after(SUBNET_VALIDATOR_START_DELAY),
        end: unix_after(
            SUBNET_VALIDATOR_START_DELAY + Duration::from_secs(args.duration_hours * SECS_PER_HOUR),
        ),
        weight: args.weight,
    };
    println!("🔧 Adding {} to subnet {} with weight {}", args.node_id, subnet_id, args.weight);

    match deployer.add_validator(subnet_id, &auth_keys, validator).await? {
        DeployOutcome::Committed(tx_id) => {
            print_to_user(&format!("Transaction successful, transaction ID: {}", tx_id));
            Ok(())
        }
        DeployOutcome::PartiallySigned(artifact) => {
            let tx_path = args
                .output_tx_path
                .as_deref()
                .ok_or("the tx needs more signatures; pass --output-tx-path to save it")?;
            let set = artifact.signer_set(&info.control_keys)?;
            save_partially_signed(&artifact, &args.name, tx_path, &set)
        }
    }
}

// ----------------------------------------------------------------------------
// Local network
// ----------------------------------------------------------------------------

/// Install custom VMs on the running local cluster
pub async fn cmd_network_bootstrap(
    ctx: &AppContext,
    vms: &[(String, PathBuf)],
    timeout_secs: Option<u64>,
) -> CliResult<()> {
    let mut specs = Vec::with_capacity(vms.len());
    for (name, genesis_path) in vms {
        specs.push(VmSpec {
            name: name.clone(),
            genesis: fs::read(genesis_path)?,
        });
    }

    let options = BootstrapOptions {
        wallet: ctx.config.wallet_options(Network::Local),
        min_balance: ctx.config.min_bootstrap_balance,
        readiness_interval: ctx.config.readiness_interval(),
    };
    let sequencer = BootstrapSequencer::new(
        ctx.cluster()?,
        ctx.connector(),
        Keychain::local_funded()?,
        specs,
        options,
    )?;

    let timeout = timeout_or(timeout_secs, ctx.config.bootstrap_timeout());
    let indicator = WaitIndicator::start("⏳ Bootstrapping local cluster");
    let result = sequencer.run(Instant::now() + timeout).await;
    indicator.stop().await;

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if e.is_timeout() {
                println!(
                    "⚠️  Bootstrap did not finish within {}s (stopped in phase: {})",
                    timeout.as_secs(),
                    e.phase()
                );
            }
            return Err(e.into());
        }
    };

    for (name, vm) in &report.vms {
        let mut sidecar = ctx.sidecars.load_or_new(name, name)?;
        if let Some(subnet_id) = vm.subnet_id {
            sidecar.set_subnet_id(Network::Local, subnet_id);
        }
        if let Some(blockchain_id) = vm.blockchain_id {
            sidecar.set_blockchain_id(Network::Local, blockchain_id);
            let endpoints: Vec<String> = report
                .node_uris
                .values()
                .map(|uri| rpc_endpoint(uri, &blockchain_id))
                .collect();
            sidecar.add_rpc_endpoints(Network::Local, &endpoints);
        }
        ctx.sidecars.save(&sidecar)?;
    }

    println!("✅ Bootstrapped {} VM(s) on {} node(s)", report.vms.len(), report.node_uris.len());
    Ok(())
}

/// Restart the cluster to track an already deployed blockchain
pub async fn cmd_network_track(
    ctx: &AppContext,
    blockchain: &str,
    timeout_secs: Option<u64>,
) -> CliResult<()> {
    let endpoints = track(ctx, blockchain, timeout_secs).await?;
    println!("✅ {} is running on {} node(s)", blockchain, endpoints.len());
    Ok(())
}

/// Show cluster nodes and known blockchain endpoints
pub async fn cmd_network_status(ctx: &AppContext) -> CliResult<()> {
    let cluster = ctx.cluster()?;
    let status = cluster.status().await?;

    println!(
        "🌐 Local cluster: {}",
        if status.healthy { "healthy" } else { "not healthy" }
    );
    for node in status.node_infos.values() {
        println!("   ├─ {} {} {}", node.name, node.id, node.uri);
    }

    let names = ctx.sidecars.list()?;
    if names.is_empty() {
        return Ok(());
    }
    println!("\n📋 Blockchains:");
    for name in &names {
        let sidecar = ctx.sidecars.load(name)?;
        let Some(data) = sidecar.network(Network::Local) else {
            continue;
        };
        for endpoint in &data.rpc_endpoints {
            println!("   {} - {}", name, endpoint);
        }
    }

    Ok(())
}
