//! Endpoint-bound wallet
//!
//! A [`Wallet`] pairs a keychain with a [`Backend`] fetched once at
//! [`Wallet::bind`]. [`Wallet::rebind`] swaps only the RPC client, so
//! balances and transaction history survive a node restart that moves the
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use super::backend::Backend;
use super::builder::{subnet_auth_for, Builder, FeeConfig};
use super::keychain::{Keychain, Signer};
use crate::client::{ClientError, Connector, PlatformClient, TxStatus};
use crate::core::{Id, Network, NodeId, OutputOwners, ShortId, SubnetAuth, Tx, TxError, Validator};
use crate::crypto::KeyError;
use crate::resilience::{poll_until, Backoff, PollError};

/// How often tx status is polled after issuance
pub const DEFAULT_POLL_FREQUENCY: Duration = Duration::from_secs(5);

/// How long to wait for an issued tx to be accepted
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Keychain holds no keys")]
    EmptyKeychain,
    #[error("{0} is not a control key of the subnet")]
    NotAControlKey(ShortId),
    #[error("Not enough subnet auth signers: have {have}, need {need}")]
    NotEnoughSigners { have: usize, need: usize },
    #[error("Signer index {index} out of range ({count} owners)")]
    SignerIndexOutOfRange { index: u32, count: usize },
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TxError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl WalletError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WalletError::ClientError(e) if e.is_timeout())
    }
}

/// Knobs for building and confirming transactions
#[derive(Debug, Clone)]
pub struct WalletOptions {
    pub network_id: u32,
    pub fees: FeeConfig,
    pub poll_frequency: Duration,
    pub confirm_timeout: Duration,
}

impl WalletOptions {
    pub fn for_network(network: Network) -> Self {
        Self {
            network_id: network.network_id(),
            fees: FeeConfig::default(),
            poll_frequency: DEFAULT_POLL_FREQUENCY,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }
}

pub struct Wallet {
    connector: Arc<dyn Connector>,
    client: Arc<dyn PlatformClient>,
    keychain: Keychain,
    backend: Backend,
    builder: Builder,
    options: WalletOptions,
}

impl Wallet {
    /// Connect to `endpoint` and fetch the keychain's UTXOs once
    pub async fn bind(
        connector: Arc<dyn Connector>,
        endpoint: &str,
        keychain: Keychain,
        options: WalletOptions,
    ) -> Result<Self, WalletError> {
        let addrs = keychain.addresses();
        let client = connector.connect(endpoint)?;
        let asset_id = client.get_staking_asset_id().await?;
        let builder = Builder::new(
            options.network_id,
            asset_id,
            options.fees.clone(),
            addrs.clone(),
        )?;
        let utxos = client.get_utxos(&addrs).await?;
        log::info!(
            "wallet bound to {} with {} key(s) and {} utxo(s)",
            endpoint,
            addrs.len(),
            utxos.len()
        );

        Ok(Self {
            connector,
            client,
            keychain,
            backend: Backend::from_utxos(utxos),
            builder,
            options,
        })
    }

    /// Point the wallet at a new endpoint without refetching state
    pub fn rebind(&mut self, endpoint: &str) -> Result<(), WalletError> {
        let client = self.connector.connect(endpoint)?;
        log::info!("wallet rebound from {} to {}", self.client.endpoint(), endpoint);
        self.client = client;
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub fn client(&self) -> Arc<dyn PlatformClient> {
        Arc::clone(&self.client)
    }

    pub fn keychain(&self) -> &Keychain {
        &self.keychain
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn addresses(&self) -> Vec<ShortId> {
        self.keychain.addresses()
    }

    /// Address receiving change and acting as default owner
    pub fn change_address(&self) -> ShortId {
        self.builder.change_addr()
    }

    pub fn balance(&self) -> u64 {
        self.backend.balance(&self.keychain.addresses())
    }

    /// Owner set of a subnet, from local history when available
    pub async fn subnet_owners(&self, subnet_id: Id) -> Result<OutputOwners, WalletError> {
        if let Some(owners) = self.backend.subnet_owner(&subnet_id) {
            return Ok(owners.clone());
        }
        let info = self.client.get_subnet(subnet_id).await?;
        Ok(OutputOwners {
            locktime: 0,
            threshold: info.threshold,
            addrs: info.control_keys,
        })
    }

    /// Add every signature this keychain can contribute. Returns the
    /// addresses that filled at least one previously empty slot.
    pub async fn sign(&self, tx: &mut Tx) -> Result<Vec<ShortId>, WalletError> {
        let owners = match tx.unsigned.subnet_id() {
            Some(subnet_id) if tx.unsigned.subnet_auth().is_some() => {
                Some(self.subnet_owners(subnet_id).await?)
            }
            _ => None,
        };
        self.sign_with_owners(tx, owners.as_ref())
    }

    /// Signing against a known subnet owner set
    pub fn sign_with_owners(
        &self,
        tx: &mut Tx,
        subnet_owners: Option<&OutputOwners>,
    ) -> Result<Vec<ShortId>, WalletError> {
        let digest = tx.unsigned.signing_digest();
        let mut added = Vec::new();

        // Funding inputs we know nothing about belong to someone else.
        let inputs = tx.unsigned.base().inputs.clone();
        for (cred, input) in inputs.iter().enumerate() {
            let Some(utxo) = self.backend.utxo(&input.utxo_id) else {
                continue;
            };
            let owners = &utxo.output.owners;
            for (slot, index) in input.sig_indices.iter().enumerate() {
                let addr = owners.addrs.get(*index as usize).ok_or(
                    WalletError::SignerIndexOutOfRange {
                        index: *index,
                        count: owners.addrs.len(),
                    },
                )?;
                if let Some(sig) = self.keychain.sign(addr, &digest)? {
                    if tx.fill_signature(cred, slot, sig)? {
                        added.push(addr.clone());
                    }
                }
            }
        }

        let auth_cred = tx.subnet_auth_cred_index();
        let auth = tx.unsigned.subnet_auth().cloned();
        if let (Some(cred), Some(auth), Some(owners)) = (auth_cred, auth, subnet_owners) {
            for (slot, index) in auth.sig_indices.iter().enumerate() {
                let addr = owners.addrs.get(*index as usize).ok_or(
                    WalletError::SignerIndexOutOfRange {
                        index: *index,
                        count: owners.addrs.len(),
                    },
                )?;
                if let Some(sig) = self.keychain.sign(addr, &digest)? {
                    if tx.fill_signature(cred, slot, sig)? {
                        added.push(addr.clone());
                    }
                }
            }
        }

        added.sort();
        added.dedup();
        Ok(added)
    }

    /// Submit a signed transaction and wait until it is committed
    pub async fn issue_tx(&mut self, tx: &Tx) -> Result<Id, WalletError> {
        let tx_id = self.client.issue_tx(&tx.bytes()).await?;
        log::info!("issued {} {} via {}", tx.kind(), tx_id, self.endpoint());

        self.await_committed(tx_id).await?;
        let addrs = self.keychain.addresses();
        self.backend.accept_tx(tx_id, tx, &addrs);
        Ok(tx_id)
    }

    async fn await_committed(&self, tx_id: Id) -> Result<(), WalletError> {
        let client = Arc::clone(&self.client);
        let deadline = Instant::now() + self.options.confirm_timeout;
        let backoff = Backoff::constant(self.options.poll_frequency);

        let result = poll_until(&backoff, deadline, || {
            let client = Arc::clone(&client);
            async move {
                match client.get_tx_status(tx_id).await? {
                    TxStatus::Committed => Ok(true),
                    TxStatus::Processing | TxStatus::Unknown => Ok(false),
                    TxStatus::Dropped(reason) => Err(ClientError::Dropped { tx_id, reason }),
                }
            }
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Failed(e)) => Err(e.into()),
            Err(PollError::Timeout { waited }) => Err(ClientError::Timeout {
                what: format!("acceptance of tx {}", tx_id),
                waited,
            }
            .into()),
        }
    }

    /// Subnet auth using only keys this wallet holds
    fn own_subnet_auth(&self, owners: &OutputOwners) -> Result<SubnetAuth, WalletError> {
        let held: Vec<ShortId> = owners
            .addrs
            .iter()
            .filter(|a| self.keychain.contains(a))
            .take(owners.threshold as usize)
            .cloned()
            .collect();
        subnet_auth_for(owners, &held)
    }

    async fn sign_and_issue(&mut self, mut tx: Tx) -> Result<Id, WalletError> {
        self.sign(&mut tx).await?;
        self.issue_tx(&tx).await
    }

    pub async fn issue_create_subnet_tx(&mut self, owner: OutputOwners) -> Result<Id, WalletError> {
        let unsigned = self.builder.new_create_subnet_tx(&self.backend, owner)?;
        self.sign_and_issue(Tx::new(unsigned)).await
    }

    pub async fn issue_create_chain_tx(
        &mut self,
        subnet_id: Id,
        genesis: Vec<u8>,
        vm_id: Id,
        fx_ids: Vec<Id>,
        chain_name: &str,
    ) -> Result<Id, WalletError> {
        let owners = self.subnet_owners(subnet_id).await?;
        let auth = self.own_subnet_auth(&owners)?;
        let unsigned = self.builder.new_create_chain_tx(
            &self.backend,
            subnet_id,
            auth,
            genesis,
            vm_id,
            fx_ids,
            chain_name,
        )?;
        self.sign_and_issue(Tx::new(unsigned)).await
    }

    pub async fn issue_add_validator_tx(
        &mut self,
        validator: Validator,
        rewards_owner: OutputOwners,
        delegation_shares: u32,
    ) -> Result<Id, WalletError> {
        let unsigned = self.builder.new_add_validator_tx(
            &self.backend,
            validator,
            rewards_owner,
            delegation_shares,
        )?;
        self.sign_and_issue(Tx::new(unsigned)).await
    }

    pub async fn issue_add_subnet_validator_tx(
        &mut self,
        validator: Validator,
        subnet_id: Id,
    ) -> Result<Id, WalletError> {
        let owners = self.subnet_owners(subnet_id).await?;
        let auth = self.own_subnet_auth(&owners)?;
        let unsigned = self.builder.new_add_subnet_validator_tx(
            &self.backend,
            validator,
            subnet_id,
            auth,
        )?;
        self.sign_and_issue(Tx::new(unsigned)).await
    }

    /// Build a create-chain tx authorized by `auth_signers` and add this
    /// wallet's signatures. Other signers may still be missing.
    pub async fn build_create_chain_tx(
        &self,
        subnet_id: Id,
        auth_signers: &[ShortId],
        genesis: Vec<u8>,
        vm_id: Id,
        chain_name: &str,
    ) -> Result<Tx, WalletError> {
        let owners = self.subnet_owners(subnet_id).await?;
        let auth = subnet_auth_for(&owners, auth_signers)?;
        let unsigned = self.builder.new_create_chain_tx(
            &self.backend,
            subnet_id,
            auth,
            genesis,
            vm_id,
            Vec::new(),
            chain_name,
        )?;
        let mut tx = Tx::new(unsigned);
        self.sign_with_owners(&mut tx, Some(&owners))?;
        Ok(tx)
    }

    /// Build an add-subnet-validator tx authorized by `auth_signers`
    pub async fn build_add_subnet_validator_tx(
        &self,
        validator: Validator,
        subnet_id: Id,
        auth_signers: &[ShortId],
    ) -> Result<Tx, WalletError> {
        let owners = self.subnet_owners(subnet_id).await?;
        let auth = subnet_auth_for(&owners, auth_signers)?;
        let unsigned = self.builder.new_add_subnet_validator_tx(
            &self.backend,
            validator,
            subnet_id,
            auth,
        )?;
        let mut tx = Tx::new(unsigned);
        self.sign_with_owners(&mut tx, Some(&owners))?;
        Ok(tx)
    }

    /// Build a remove-subnet-validator tx authorized by `auth_signers`
    pub async fn build_remove_subnet_validator_tx(
        &self,
        node_id: NodeId,
        subnet_id: Id,
        auth_signers: &[ShortId],
    ) -> Result<Tx, WalletError> {
        let owners = self.subnet_owners(subnet_id).await?;
        let auth = subnet_auth_for(&owners, auth_signers)?;
        let unsigned = self.builder.new_remove_subnet_validator_tx(
            &self.backend,
            node_id,
            subnet_id,
            auth,
        )?;
        let mut tx = Tx::new(unsigned);
        self.sign_with_owners(&mut tx, Some(&owners))?;
        Ok(tx)
    }
}
