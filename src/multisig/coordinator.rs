//! Multisig coordinator
//!
//! Drives the sign and commit lifecycle of a [`TxArtifact`] against a bound
//! [`Wallet`]. The outstanding signer set is recomputed from the artifact's
//! credentials on every call, since other signers may have added signatures
//! to the exchanged file out of process.

use thiserror::Error;

use super::artifact::TxArtifact;
use super::signers::{remaining_signers, SignerSet};
use crate::client::{ClientError, SubnetInfo, TxStatus};
use crate::core::{CodecError, Id, OutputOwners, ShortId, TxError};
use crate::crypto::{EncodingError, KeyError};
use crate::wallet::{Signer, Wallet, WalletError};

#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Subnet {0} is not permissioned")]
    NotPermissionedSubnet(Id),
    #[error("There are no required subnet auth keys present in the wallet")]
    NoSubnetAuthKeyInWallet { expected: Vec<ShortId> },
    #[error("tx is not fully signed ({signed} of {required} required signatures)")]
    NotFullySigned { signed: usize, required: usize },
    #[error("tx is already fully signed")]
    AlreadyFullySigned,
    #[error("tx {0} was already committed")]
    AlreadyCommitted(Id),
    #[error("expected {expected} credentials, found {found}")]
    CredentialMismatch { expected: usize, found: usize },
    #[error("funding credential {0} is not fully signed")]
    UnsignedFundingCredential(usize),
    #[error("subnet auth credential has {found} signatures, expected {expected}")]
    AuthSignatureCountMismatch { expected: usize, found: usize },
    #[error("signer index {index} out of range ({count} control keys)")]
    SignerIndexOutOfRange { index: u32, count: usize },
    #[error("signature in slot {slot} does not belong to {expected}")]
    ForeignSignature { slot: usize, expected: ShortId },
    #[error("unknown network id {0}")]
    UnknownNetwork(u32),
    #[error("tx does not reference a subnet")]
    MissingSubnetId,
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Transaction error: {0}")]
    Tx(#[from] TxError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

impl MultisigError {
    /// Authorization problems the caller reports as guidance, not failure
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MultisigError::NotPermissionedSubnet(_) | MultisigError::NoSubnetAuthKeyInWallet { .. }
        )
    }

    /// Node or consensus failures, as opposed to signature problems
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            MultisigError::Client(_) | MultisigError::Wallet(WalletError::ClientError(_))
        )
    }

    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            MultisigError::NotFullySigned { .. }
                | MultisigError::AlreadyFullySigned
                | MultisigError::AlreadyCommitted(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            MultisigError::Client(e) => e.is_timeout(),
            MultisigError::Wallet(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Result of a signing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// New signatures were added for these addresses
    Signed { added: Vec<ShortId> },
    /// Every required key this wallet holds has already signed
    AlreadySigned,
}

pub struct MultisigCoordinator {
    wallet: Wallet,
}

impl MultisigCoordinator {
    pub fn new(wallet: Wallet) -> Self {
        Self { wallet }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut Wallet {
        &mut self.wallet
    }

    pub fn into_wallet(self) -> Wallet {
        self.wallet
    }

    /// Authorization policy of `subnet_id` as seen by the bound node
    pub async fn get_owners(&self, subnet_id: Id) -> Result<SubnetInfo, MultisigError> {
        let info = self.wallet.client().get_subnet(subnet_id).await?;
        if !info.is_permissioned {
            return Err(MultisigError::NotPermissionedSubnet(subnet_id));
        }
        log::debug!(
            "subnet {} has {} control key(s), threshold {}",
            subnet_id,
            info.control_keys.len(),
            info.threshold
        );
        Ok(info)
    }

    pub fn remaining_signers(
        &self,
        artifact: &TxArtifact,
        control_keys: &[ShortId],
    ) -> Result<SignerSet, MultisigError> {
        remaining_signers(artifact.tx(), control_keys)
    }

    /// Control keys of the subnet the artifact authorizes against, or an
    /// empty list for kinds that carry no subnet authorization
    pub async fn control_keys_for(
        &self,
        artifact: &TxArtifact,
    ) -> Result<Vec<ShortId>, MultisigError> {
        if !artifact.kind().requires_subnet_auth() {
            return Ok(Vec::new());
        }
        let subnet_id = artifact.subnet_id().ok_or(MultisigError::MissingSubnetId)?;
        Ok(self.get_owners(subnet_id).await?.control_keys)
    }

    /// Add this wallet's signatures for any of `remaining`.
    ///
    /// Signing twice with the same wallet is a no-op the second time and
    /// reports [`SignOutcome::AlreadySigned`]. A wallet holding none of the
    /// required keys gets [`MultisigError::NoSubnetAuthKeyInWallet`] listing
    /// the addresses still expected.
    pub async fn sign(
        &self,
        artifact: &mut TxArtifact,
        remaining: &[ShortId],
        subnet_id: Id,
    ) -> Result<SignOutcome, MultisigError> {
        if artifact.tx().unsigned.subnet_auth().is_none() {
            let added = self.wallet.sign_with_owners(artifact.tx_mut(), None)?;
            return Ok(if added.is_empty() {
                SignOutcome::AlreadySigned
            } else {
                SignOutcome::Signed { added }
            });
        }

        let info = self.get_owners(subnet_id).await?;
        let keychain = self.wallet.keychain();

        if remaining.iter().any(|a| keychain.contains(a)) {
            let owners = OutputOwners {
                locktime: 0,
                threshold: info.threshold,
                addrs: info.control_keys,
            };
            let added = self
                .wallet
                .sign_with_owners(artifact.tx_mut(), Some(&owners))?;
            // `remaining` may predate signatures already in the artifact
            if added.is_empty() {
                return Ok(SignOutcome::AlreadySigned);
            }
            log::info!(
                "added {} signature(s) to {}",
                added.len(),
                artifact.display_name()
            );
            return Ok(SignOutcome::Signed { added });
        }

        let set = remaining_signers(artifact.tx(), &info.control_keys)?;
        if set.signed().iter().any(|a| keychain.contains(a)) {
            return Ok(SignOutcome::AlreadySigned);
        }
        Err(MultisigError::NoSubnetAuthKeyInWallet {
            expected: remaining.to_vec(),
        })
    }

    /// Submit a fully signed artifact and wait for it to be committed.
    ///
    /// Fails with [`MultisigError::NotFullySigned`] while any required
    /// signer is outstanding and with [`MultisigError::AlreadyCommitted`]
    /// once the artifact has been accepted.
    pub async fn commit(&mut self, artifact: &mut TxArtifact) -> Result<Id, MultisigError> {
        let tx_id = artifact.id();
        if artifact.is_committed() {
            return Err(MultisigError::AlreadyCommitted(tx_id));
        }

        let control_keys = self.control_keys_for(artifact).await?;
        let set = remaining_signers(artifact.tx(), &control_keys)?;
        if !set.is_complete() {
            return Err(MultisigError::NotFullySigned {
                signed: set.signed_count(),
                required: set.required().len(),
            });
        }

        if self.wallet.client().get_tx_status(tx_id).await? == TxStatus::Committed {
            artifact.mark_committed();
            return Err(MultisigError::AlreadyCommitted(tx_id));
        }

        let issued = self.wallet.issue_tx(artifact.tx()).await?;
        artifact.mark_committed();
        log::info!("committed {} as {}", artifact.display_name(), issued);
        Ok(issued)
    }
}
