//! Transaction builder
//!
//! Selects funding UTXOs from the [`Backend`], returns change to the
//! wallet's change address and assembles unsigned transactions for every
//! supported kind.

use serde::{Deserialize, Serialize};

use super::backend::{spendable_by, Backend};
use super::wallet::WalletError;
use crate::core::{
    AddSubnetValidatorTx, AddValidatorTx, BaseTx, ConvertSubnetToL1Tx, CreateChainTx,
    CreateSubnetTx, Id, L1Validator, NodeId, OutputOwners, RemoveSubnetValidatorTx, ShortId,
    SubnetAuth, TransferSubnetOwnershipTx, TransferableInput, TransferableOutput, TxKind,
    UnsignedTx, Validator,
};

/// nAVAX in one AVAX
pub const NANO_AVAX_PER_AVAX: u64 = 1_000_000_000;

/// Flat fees burned per transaction kind, in nAVAX
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    pub tx_fee: u64,
    pub create_subnet_fee: u64,
    pub create_chain_fee: u64,
    pub add_primary_validator_fee: u64,
    pub add_subnet_validator_fee: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            tx_fee: 1_000_000,
            create_subnet_fee: 100_000_000,
            create_chain_fee: 100_000_000,
            add_primary_validator_fee: 0,
            add_subnet_validator_fee: 1_000_000,
        }
    }
}

impl FeeConfig {
    pub fn fee(&self, kind: TxKind) -> u64 {
        match kind {
            TxKind::CreateSubnet => self.create_subnet_fee,
            TxKind::CreateChain => self.create_chain_fee,
            TxKind::AddValidator => self.add_primary_validator_fee,
            TxKind::AddSubnetValidator => self.add_subnet_validator_fee,
            TxKind::RemoveSubnetValidator
            | TxKind::TransferSubnetOwnership
            | TxKind::ConvertSubnetToL1 => self.tx_fee,
        }
    }
}

/// Funding selected for one transaction
#[derive(Debug, Clone, Default)]
pub struct Spend {
    pub inputs: Vec<TransferableInput>,
    pub change: Vec<TransferableOutput>,
    pub stake: Vec<TransferableOutput>,
}

/// Subnet auth indices for `signers` within the subnet's owner list
pub fn subnet_auth_for(
    owners: &OutputOwners,
    signers: &[ShortId],
) -> Result<SubnetAuth, WalletError> {
    let mut indices = Vec::with_capacity(signers.len());
    for signer in signers {
        let index = owners
            .position(signer)
            .ok_or(WalletError::NotAControlKey(signer.clone()))?;
        indices.push(index);
    }
    indices.sort_unstable();
    indices.dedup();
    if indices.len() < owners.threshold as usize {
        return Err(WalletError::NotEnoughSigners {
            have: indices.len(),
            need: owners.threshold as usize,
        });
    }
    Ok(SubnetAuth::new(indices)?)
}

pub struct Builder {
    network_id: u32,
    asset_id: Id,
    fees: FeeConfig,
    addrs: Vec<ShortId>,
    change_addr: ShortId,
}

impl Builder {
    /// Builder spending `asset_id` from `addrs`; change goes to the first
    /// address
    pub fn new(
        network_id: u32,
        asset_id: Id,
        fees: FeeConfig,
        addrs: Vec<ShortId>,
    ) -> Result<Self, WalletError> {
        let change_addr = addrs.first().ok_or(WalletError::EmptyKeychain)?.clone();
        Ok(Self {
            network_id,
            asset_id,
            fees,
            addrs,
            change_addr,
        })
    }

    pub fn change_addr(&self) -> ShortId {
        self.change_addr.clone()
    }

    pub fn fees(&self) -> &FeeConfig {
        &self.fees
    }

    pub fn asset_id(&self) -> Id {
        self.asset_id
    }

    fn owned_by_change(&self, amount: u64) -> TransferableOutput {
        TransferableOutput {
            asset_id: self.asset_id,
            amount,
            owners: OutputOwners::new(1, vec![self.change_addr.clone()]),
        }
    }

    /// Select UTXOs covering `burn + stake` in stable id order
    pub fn spend(&self, backend: &Backend, burn: u64, stake: u64) -> Result<Spend, WalletError> {
        let need = burn.saturating_add(stake);
        let mut spend = Spend::default();
        let mut selected = 0u64;

        for utxo in backend.utxos() {
            if selected >= need {
                break;
            }
            let owners = &utxo.output.owners;
            if utxo.output.asset_id != self.asset_id || !spendable_by(owners, &self.addrs) {
                continue;
            }
            let sig_indices: Vec<u32> = owners
                .addrs
                .iter()
                .enumerate()
                .filter(|(_, a)| self.addrs.contains(a))
                .map(|(i, _)| i as u32)
                .take(owners.threshold as usize)
                .collect();
            spend.inputs.push(TransferableInput {
                utxo_id: utxo.utxo_id,
                asset_id: self.asset_id,
                amount: utxo.output.amount,
                sig_indices,
            });
            selected += utxo.output.amount;
        }

        if selected < need {
            return Err(WalletError::InsufficientFunds {
                have: selected,
                need,
            });
        }
        if stake > 0 {
            spend.stake.push(self.owned_by_change(stake));
        }
        let change = selected - need;
        if change > 0 {
            spend.change.push(self.owned_by_change(change));
        }
        Ok(spend)
    }

    /// Inputs sorted by UTXO id and outputs by their packed bytes, as the
    /// P-Chain verifies
    fn base(&self, mut spend: Spend) -> BaseTx {
        spend.inputs.sort_by_key(|input| input.utxo_id);
        spend.change.sort_by_cached_key(TransferableOutput::sort_key);
        BaseTx {
            network_id: self.network_id,
            blockchain_id: Id::empty(),
            outputs: spend.change,
            inputs: spend.inputs,
            memo: Vec::new(),
        }
    }

    pub fn new_create_subnet_tx(
        &self,
        backend: &Backend,
        owner: OutputOwners,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(backend, self.fees.fee(TxKind::CreateSubnet), 0)?;
        Ok(UnsignedTx::CreateSubnet(CreateSubnetTx {
            base: self.base(spend),
            owner,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_create_chain_tx(
        &self,
        backend: &Backend,
        subnet_id: Id,
        subnet_auth: SubnetAuth,
        genesis: Vec<u8>,
        vm_id: Id,
        fx_ids: Vec<Id>,
        chain_name: &str,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(backend, self.fees.fee(TxKind::CreateChain), 0)?;
        Ok(UnsignedTx::CreateChain(CreateChainTx {
            base: self.base(spend),
            subnet_id,
            chain_name: chain_name.to_string(),
            vm_id,
            fx_ids,
            genesis,
            subnet_auth,
        }))
    }

    pub fn new_add_validator_tx(
        &self,
        backend: &Backend,
        validator: Validator,
        rewards_owner: OutputOwners,
        delegation_shares: u32,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(
            backend,
            self.fees.fee(TxKind::AddValidator),
            validator.weight,
        )?;
        let stake = spend.stake.clone();
        Ok(UnsignedTx::AddValidator(AddValidatorTx {
            base: self.base(spend),
            validator,
            stake,
            rewards_owner,
            delegation_shares,
        }))
    }

    pub fn new_add_subnet_validator_tx(
        &self,
        backend: &Backend,
        validator: Validator,
        subnet_id: Id,
        subnet_auth: SubnetAuth,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(backend, self.fees.fee(TxKind::AddSubnetValidator), 0)?;
        Ok(UnsignedTx::AddSubnetValidator(AddSubnetValidatorTx {
            base: self.base(spend),
            validator,
            subnet_id,
            subnet_auth,
        }))
    }

    pub fn new_remove_subnet_validator_tx(
        &self,
        backend: &Backend,
        node_id: NodeId,
        subnet_id: Id,
        subnet_auth: SubnetAuth,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(backend, self.fees.fee(TxKind::RemoveSubnetValidator), 0)?;
        Ok(UnsignedTx::RemoveSubnetValidator(RemoveSubnetValidatorTx {
            base: self.base(spend),
            node_id,
            subnet_id,
            subnet_auth,
        }))
    }

    pub fn new_transfer_subnet_ownership_tx(
        &self,
        backend: &Backend,
        subnet_id: Id,
        subnet_auth: SubnetAuth,
        owner: OutputOwners,
    ) -> Result<UnsignedTx, WalletError> {
        let spend = self.spend(backend, self.fees.fee(TxKind::TransferSubnetOwnership), 0)?;
        Ok(UnsignedTx::TransferSubnetOwnership(TransferSubnetOwnershipTx {
            base: self.base(spend),
            subnet_id,
            subnet_auth,
            owner,
        }))
    }

    pub fn new_convert_subnet_to_l1_tx(
        &self,
        backend: &Backend,
        subnet_id: Id,
        chain_id: Id,
        manager_address: Vec<u8>,
        validators: Vec<L1Validator>,
        subnet_auth: SubnetAuth,
    ) -> Result<UnsignedTx, WalletError> {
        let balance: u64 = validators.iter().map(|v| v.balance).sum();
        let spend = self.spend(
            backend,
            self.fees
                .fee(TxKind::ConvertSubnetToL1)
                .saturating_add(balance),
            0,
        )?;
        Ok(UnsignedTx::ConvertSubnetToL1(ConvertSubnetToL1Tx {
            base: self.base(spend),
            subnet_id,
            chain_id,
            manager_address,
            validators,
            subnet_auth,
        }))
    }
}
