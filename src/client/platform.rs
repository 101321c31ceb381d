//! Network client seams
//!
//! [`PlatformClient`] is everything the wallet, the multisig coordinator and
//! the bootstrap sequencer need from a node: P-Chain state queries, tx
//! issuance and the node's own identity. [`Connector`] turns an endpoint URI
//! into a client, which is what lets a wallet be rebound after the node it
//! was talking to restarts under a new URI.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::{CodecError, Id, IdError, NodeId, ShortId, Utxo};

/// Errors talking to a node
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Malformed response from {method}: {detail}")]
    Malformed { method: &'static str, detail: String },
    #[error("Invalid identifier in response: {0}")]
    Id(#[from] IdError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
    #[error("Transaction {tx_id} was dropped: {reason}")]
    Dropped { tx_id: Id, reason: String },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout { .. } => true,
            ClientError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Authorization policy of a subnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetInfo {
    pub is_permissioned: bool,
    pub control_keys: Vec<ShortId>,
    pub threshold: u32,
}

/// Acceptance status of an issued transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Committed,
    Processing,
    Dropped(String),
    Unknown,
}

#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Base URI this client talks to
    fn endpoint(&self) -> &str;

    /// All UTXOs owned (at least partly) by any of `addrs`
    async fn get_utxos(&self, addrs: &[ShortId]) -> Result<Vec<Utxo>, ClientError>;

    async fn get_subnet(&self, subnet_id: Id) -> Result<SubnetInfo, ClientError>;

    /// Node ids currently validating `subnet_id` (empty id = primary network)
    async fn get_current_validators(&self, subnet_id: Id) -> Result<Vec<NodeId>, ClientError>;

    async fn issue_tx(&self, tx_bytes: &[u8]) -> Result<Id, ClientError>;

    async fn get_tx_status(&self, tx_id: Id) -> Result<TxStatus, ClientError>;

    /// Asset id of AVAX on this network
    async fn get_staking_asset_id(&self) -> Result<Id, ClientError>;

    /// Numeric network id; selects the address HRP
    async fn get_network_id(&self) -> Result<u32, ClientError>;

    /// Identity of the node behind this endpoint
    async fn get_node_id(&self) -> Result<NodeId, ClientError>;
}

/// Opens clients for endpoints
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn PlatformClient>, ClientError>;
}
