//! subnet-cli
//!
//! Command-line interface for multisig subnet transactions and local
//! cluster bootstrap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use subnet_cli::cli::{self, AddValidatorArgs, AppContext, DeployArgs};
use subnet_cli::config::{default_base_dir, AppConfig};

#[derive(Parser)]
#[command(name = "subnet-cli")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Multisig subnet transactions and local cluster bootstrap", long_about = None)]
struct Cli {
    /// Directory holding keys, sidecars and config.json (default ~/.subnet-cli)
    #[arg(short, long)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stored key operations
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },

    /// Sign and commit multisig transactions
    Transaction {
        #[command(subcommand)]
        action: TransactionCommands,
    },

    /// Deploy blockchains and manage subnet validators
    Blockchain {
        #[command(subcommand)]
        action: BlockchainCommands,
    },

    /// Local cluster operations
    Network {
        #[command(subcommand)]
        action: NetworkCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Create a new stored key
    Create {
        /// Key name
        name: String,

        /// Import the hex private key in this file instead of generating one
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// List stored keys
    List,
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// Add signatures to a partially signed tx file
    Sign {
        /// Blockchain the tx belongs to
        blockchain: Option<String>,

        /// Tx file to sign
        #[arg(long)]
        input_tx_filepath: PathBuf,

        /// Stored key to sign with
        #[arg(short, long)]
        key: String,
    },

    /// Issue a fully signed tx file
    Commit {
        /// Blockchain the tx belongs to
        blockchain: String,

        /// Tx file to commit
        #[arg(long)]
        input_tx_filepath: PathBuf,
    },
}

#[derive(Subcommand)]
enum BlockchainCommands {
    /// Create a blockchain on a permissioned subnet
    Deploy(DeployArgs),

    /// Add a validator to a blockchain's subnet
    AddValidator(AddValidatorArgs),
}

#[derive(Subcommand)]
enum NetworkCommands {
    /// Install custom VMs on the running local cluster
    Bootstrap {
        /// VM to install, as NAME=GENESIS_FILE (repeatable)
        #[arg(long = "vm", value_parser = cli::parse_vm_arg, required = true)]
        vms: Vec<(String, PathBuf)>,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Restart the cluster to run a deployed blockchain
    Track {
        /// Blockchain name
        blockchain: String,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show cluster nodes and blockchain endpoints
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let base_dir = cli.base_dir.unwrap_or_else(default_base_dir);

    // Initialize logger
    let log_level = AppConfig::load(&base_dir)
        .map(|config| config.log_level)
        .unwrap_or_else(|_| AppConfig::default().log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let ctx = AppContext::new(base_dir)?;

    // Key commands never touch the network
    if let Commands::Key { action } = &cli.command {
        return match action {
            KeyCommands::Create { name, file } => cli::cmd_key_create(&ctx, name, file.as_deref()),
            KeyCommands::List => cli::cmd_key_list(&ctx),
        };
    }

    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        match cli.command {
            Commands::Key { .. } => unreachable!(),
            Commands::Transaction { action } => match action {
                TransactionCommands::Sign {
                    blockchain,
                    input_tx_filepath,
                    key,
                } => {
                    cli::cmd_transaction_sign(
                        &ctx,
                        blockchain.as_deref(),
                        &input_tx_filepath,
                        &key,
                    )
                    .await
                }
                TransactionCommands::Commit {
                    blockchain,
                    input_tx_filepath,
                } => cli::cmd_transaction_commit(&ctx, &blockchain, &input_tx_filepath).await,
            },
            Commands::Blockchain { action } => match action {
                BlockchainCommands::Deploy(args) => cli::cmd_blockchain_deploy(&ctx, &args).await,
                BlockchainCommands::AddValidator(args) => {
                    cli::cmd_blockchain_add_validator(&ctx, &args).await
                }
            },
            Commands::Network { action } => match action {
                NetworkCommands::Bootstrap { vms, timeout } => {
                    cli::cmd_network_bootstrap(&ctx, &vms, timeout).await
                }
                NetworkCommands::Track {
                    blockchain,
                    timeout,
                } => cli::cmd_network_track(&ctx, &blockchain, timeout).await,
                NetworkCommands::Status => cli::cmd_network_status(&ctx).await,
            },
        }
    })
}
