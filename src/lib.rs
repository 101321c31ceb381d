//! subnet-cli: multisig subnet transactions and local cluster bootstrap
//!
//! This crate provides:
//! - A multisig coordinator that reads a subnet's control keys and
//!   threshold, reports remaining signers, accumulates signatures into a
//!   portable tx file and commits it once the threshold is met
//! - A cluster bootstrap sequencer that installs custom VMs on a running
//!   local cluster in strictly ordered phases
//! - A wallet whose node binding can be refreshed after restarts without
//!   losing its local state
//!
//! # Example
//!
//! ```rust
//! use subnet_cli::core::{format_address, Network};
//! use subnet_cli::crypto::KeyPair;
//! use subnet_cli::wallet::Keychain;
//!
//! let key = KeyPair::generate().unwrap();
//! let keychain = Keychain::from_keys([key.clone()]);
//! assert_eq!(keychain.len(), 1);
//! let address = format_address(&key.short_id(), Network::Testnet.network_id()).unwrap();
//! assert!(address.starts_with("P-fuji1"));
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod crypto;
pub mod localnet;
pub mod multisig;
pub mod resilience;
pub mod storage;
pub mod ux;
pub mod wallet;

// Re-export commonly used types
pub use client::{Connector, HttpConnector, PlatformClient};
pub use config::AppConfig;
pub use core::{Id, Network, NodeId, ShortId, Tx, TxKind};
pub use crypto::KeyPair;
pub use localnet::{BootstrapError, BootstrapSequencer, ClusterControl, RunnerClient};
pub use multisig::{MultisigCoordinator, MultisigError, PublicDeployer, TxArtifact};
pub use storage::{Sidecar, SidecarStore};
pub use wallet::{Keychain, Wallet};
