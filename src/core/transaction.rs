//! P-Chain transaction model
//!
//! Transactions are a closed set of kinds modelled as the tagged union
//! [`UnsignedTx`]. Every kind carries a [`BaseTx`] (funding inputs and
//! change outputs); kinds that act on a permissioned subnet also carry a
//! [`SubnetAuth`] naming which of the subnet's control keys must sign.
//!
//! A signed [`Tx`] holds one [`Credential`] per funding input, followed by
//! one credential for the subnet authorization when present. Each credential
//! has one signature slot per signer index; empty (all-zero) slots are
//! still waiting for a signature.
//!
//! Every type packs to avalanchego's binary layout, so signing digests, tx
//! ids and issued bytes match what a node computes.

use std::fmt;

use thiserror::Error;

use super::codec::{type_id, CodecError, Reader, Writer};
use super::ids::{Id, NodeId, ShortId};
use crate::crypto::{sha256, SIGNATURE_LEN};

/// Length of a compressed BLS public key
pub const BLS_PUBLIC_KEY_LEN: usize = 48;
/// Length of a BLS proof of possession
pub const BLS_SIGNATURE_LEN: usize = 96;

// =============================================================================
// Error Types
// =============================================================================

/// Structural transaction errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TxError {
    #[error("Credential index {index} out of range ({count} credentials)")]
    CredentialOutOfRange { index: usize, count: usize },
    #[error("Signature slot {slot} out of range in credential {cred} ({len} slots)")]
    SlotOutOfRange { cred: usize, slot: usize, len: usize },
    #[error("Subnet auth signer indices must be strictly increasing: {0:?}")]
    UnsortedSignerIndices(Vec<u32>),
}

/// Values with a fixed binary layout
pub trait Packable: Sized {
    fn pack(&self, w: &mut Writer);

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError>;
}

fn pack_list<T: Packable>(w: &mut Writer, items: &[T]) {
    w.count(items.len());
    for item in items {
        item.pack(w);
    }
}

fn unpack_list<T: Packable>(r: &mut Reader<'_>) -> Result<Vec<T>, CodecError> {
    let count = r.count()?;
    (0..count).map(|_| T::unpack(r)).collect()
}

fn pack_u32s(w: &mut Writer, values: &[u32]) {
    w.count(values.len());
    for v in values {
        w.u32(*v);
    }
}

fn unpack_u32s(r: &mut Reader<'_>) -> Result<Vec<u32>, CodecError> {
    let count = r.count()?;
    (0..count).map(|_| r.u32()).collect()
}

fn pack_short_ids(w: &mut Writer, addrs: &[ShortId]) {
    w.count(addrs.len());
    for addr in addrs {
        w.short_id(addr);
    }
}

fn unpack_short_ids(r: &mut Reader<'_>) -> Result<Vec<ShortId>, CodecError> {
    let count = r.count()?;
    (0..count).map(|_| r.short_id()).collect()
}

// =============================================================================
// Signatures and credentials
// =============================================================================

/// A 65-byte recoverable signature; all zero means "not yet signed"
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn empty() -> Self {
        Self([0u8; SIGNATURE_LEN])
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Signature(empty)")
        } else {
            write!(f, "Signature({}..)", hex::encode(&self.0[..6]))
        }
    }
}

/// Signatures for one input or for the subnet authorization
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub sigs: Vec<Signature>,
}

impl Credential {
    /// A credential with `slots` empty signatures
    pub fn with_slots(slots: usize) -> Self {
        Self {
            sigs: vec![Signature::empty(); slots],
        }
    }

    pub fn is_complete(&self) -> bool {
        self.sigs.iter().all(|s| !s.is_empty())
    }

    pub fn signed_count(&self) -> usize {
        self.sigs.iter().filter(|s| !s.is_empty()).count()
    }
}

impl Packable for Credential {
    fn pack(&self, w: &mut Writer) {
        w.u32(type_id::CREDENTIAL);
        w.count(self.sigs.len());
        for sig in &self.sigs {
            w.fixed(sig.as_bytes());
        }
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.expect_type("credential", type_id::CREDENTIAL)?;
        let count = r.count()?;
        let mut sigs = Vec::with_capacity(count);
        for _ in 0..count {
            let mut bytes = [0u8; SIGNATURE_LEN];
            bytes.copy_from_slice(&r.fixed(SIGNATURE_LEN)?);
            sigs.push(Signature::new(bytes));
        }
        Ok(Self { sigs })
    }
}

// =============================================================================
// Outputs, inputs and UTXOs
// =============================================================================

/// Reference to an output of an earlier transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtxoId {
    pub tx_id: Id,
    pub output_index: u32,
}

impl fmt::Display for UtxoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.output_index)
    }
}

/// Threshold ownership over a set of addresses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addrs: Vec<ShortId>,
}

impl OutputOwners {
    /// Owners with addresses sorted and deduplicated
    pub fn new(threshold: u32, mut addrs: Vec<ShortId>) -> Self {
        addrs.sort();
        addrs.dedup();
        Self {
            locktime: 0,
            threshold,
            addrs,
        }
    }

    pub fn position(&self, addr: &ShortId) -> Option<u32> {
        self.addrs.iter().position(|a| a == addr).map(|i| i as u32)
    }

    fn pack_fields(&self, w: &mut Writer) {
        w.u64(self.locktime);
        w.u32(self.threshold);
        pack_short_ids(w, &self.addrs);
    }

    fn unpack_fields(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            locktime: r.u64()?,
            threshold: r.u32()?,
            addrs: unpack_short_ids(r)?,
        })
    }
}

/// Owners as an `fx.Owner` interface value
impl Packable for OutputOwners {
    fn pack(&self, w: &mut Writer) {
        w.u32(type_id::OUTPUT_OWNERS);
        self.pack_fields(w);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.expect_type("owner", type_id::OUTPUT_OWNERS)?;
        Self::unpack_fields(r)
    }
}

/// Amount of one asset locked to an owner set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableOutput {
    pub asset_id: Id,
    pub amount: u64,
    pub owners: OutputOwners,
}

impl TransferableOutput {
    /// Canonical ordering key: outputs are sorted by their packed bytes
    pub fn sort_key(&self) -> Vec<u8> {
        let mut w = Writer::default();
        self.pack(&mut w);
        w.into_bytes()
    }
}

impl Packable for TransferableOutput {
    fn pack(&self, w: &mut Writer) {
        w.id(&self.asset_id);
        w.u32(type_id::TRANSFER_OUTPUT);
        w.u64(self.amount);
        self.owners.pack_fields(w);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let asset_id = r.id()?;
        r.expect_type("output", type_id::TRANSFER_OUTPUT)?;
        Ok(Self {
            asset_id,
            amount: r.u64()?,
            owners: OutputOwners::unpack_fields(r)?,
        })
    }
}

/// Funding input consuming a UTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Id,
    pub amount: u64,
    /// Positions in the consumed output's owner list that will sign
    pub sig_indices: Vec<u32>,
}

impl Packable for TransferableInput {
    fn pack(&self, w: &mut Writer) {
        w.id(&self.utxo_id.tx_id);
        w.u32(self.utxo_id.output_index);
        w.id(&self.asset_id);
        w.u32(type_id::TRANSFER_INPUT);
        w.u64(self.amount);
        pack_u32s(w, &self.sig_indices);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let utxo_id = UtxoId {
            tx_id: r.id()?,
            output_index: r.u32()?,
        };
        let asset_id = r.id()?;
        r.expect_type("input", type_id::TRANSFER_INPUT)?;
        Ok(Self {
            utxo_id,
            asset_id,
            amount: r.u64()?,
            sig_indices: unpack_u32s(r)?,
        })
    }
}

/// Unspent transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub output: TransferableOutput,
}

impl Utxo {
    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::versioned();
        w.id(&self.utxo_id.tx_id);
        w.u32(self.utxo_id.output_index);
        self.output.pack(&mut w);
        w.into_bytes()
    }

    /// Decode a UTXO as returned by `platform.getUTXOs`. Stakeable-locked
    /// outputs carry their stake lock in the owners' locktime, which keeps
    /// them out of coin selection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::versioned(bytes)?;
        let utxo_id = UtxoId {
            tx_id: r.id()?,
            output_index: r.u32()?,
        };
        let asset_id = r.id()?;
        let stake_locktime = match r.u32()? {
            type_id::TRANSFER_OUTPUT => 0,
            type_id::STAKEABLE_LOCK_OUT => {
                let locktime = r.u64()?;
                r.expect_type("locked output", type_id::TRANSFER_OUTPUT)?;
                locktime
            }
            found => return Err(CodecError::UnexpectedType { what: "utxo output", found }),
        };
        let amount = r.u64()?;
        let mut owners = OutputOwners::unpack_fields(&mut r)?;
        owners.locktime = owners.locktime.max(stake_locktime);
        r.finish()?;

        Ok(Self {
            utxo_id,
            output: TransferableOutput {
                asset_id,
                amount,
                owners,
            },
        })
    }
}

// =============================================================================
// Transaction bodies
// =============================================================================

/// Fields shared by every transaction kind
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseTx {
    pub network_id: u32,
    pub blockchain_id: Id,
    pub outputs: Vec<TransferableOutput>,
    pub inputs: Vec<TransferableInput>,
    pub memo: Vec<u8>,
}

impl Packable for BaseTx {
    fn pack(&self, w: &mut Writer) {
        w.u32(self.network_id);
        w.id(&self.blockchain_id);
        pack_list(w, &self.outputs);
        pack_list(w, &self.inputs);
        w.bytes(&self.memo);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            network_id: r.u32()?,
            blockchain_id: r.id()?,
            outputs: unpack_list(r)?,
            inputs: unpack_list(r)?,
            memo: r.bytes()?,
        })
    }
}

/// Which control keys of the subnet sign this transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubnetAuth {
    pub sig_indices: Vec<u32>,
}

impl SubnetAuth {
    pub fn new(sig_indices: Vec<u32>) -> Result<Self, TxError> {
        let auth = Self { sig_indices };
        auth.validate()?;
        Ok(auth)
    }

    pub fn validate(&self) -> Result<(), TxError> {
        if self.sig_indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TxError::UnsortedSignerIndices(self.sig_indices.clone()));
        }
        Ok(())
    }
}

impl Packable for SubnetAuth {
    fn pack(&self, w: &mut Writer) {
        w.u32(type_id::SUBNET_AUTH);
        pack_u32s(w, &self.sig_indices);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.expect_type("subnet auth", type_id::SUBNET_AUTH)?;
        Ok(Self {
            sig_indices: unpack_u32s(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub node_id: NodeId,
    /// Unix seconds
    pub start: u64,
    pub end: u64,
    pub weight: u64,
}

impl Packable for Validator {
    fn pack(&self, w: &mut Writer) {
        w.node_id(&self.node_id);
        w.u64(self.start);
        w.u64(self.end);
        w.u64(self.weight);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            node_id: r.node_id()?,
            start: r.u64()?,
            end: r.u64()?,
            weight: r.u64()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubnetTx {
    pub base: BaseTx,
    pub owner: OutputOwners,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChainTx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub chain_name: String,
    pub vm_id: Id,
    pub fx_ids: Vec<Id>,
    pub genesis: Vec<u8>,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub stake: Vec<TransferableOutput>,
    pub rewards_owner: OutputOwners,
    /// Delegation fee in units of 1/10_000 percent
    pub delegation_shares: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSubnetValidatorTx {
    pub base: BaseTx,
    pub validator: Validator,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveSubnetValidatorTx {
    pub base: BaseTx,
    pub node_id: NodeId,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSubnetOwnershipTx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub subnet_auth: SubnetAuth,
    pub owner: OutputOwners,
}

/// BLS key of an L1 validator with its proof of possession
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfPossession {
    pub public_key: [u8; BLS_PUBLIC_KEY_LEN],
    pub signature: [u8; BLS_SIGNATURE_LEN],
}

/// Owner of funds returned to a P-Chain address set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PChainOwner {
    pub threshold: u32,
    pub addrs: Vec<ShortId>,
}

impl PChainOwner {
    pub fn new(threshold: u32, mut addrs: Vec<ShortId>) -> Self {
        addrs.sort();
        addrs.dedup();
        Self { threshold, addrs }
    }
}

impl Packable for PChainOwner {
    fn pack(&self, w: &mut Writer) {
        w.u32(self.threshold);
        pack_short_ids(w, &self.addrs);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            threshold: r.u32()?,
            addrs: unpack_short_ids(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1Validator {
    pub node_id: NodeId,
    pub weight: u64,
    pub balance: u64,
    pub signer: ProofOfPossession,
    pub remaining_balance_owner: PChainOwner,
    pub deactivation_owner: PChainOwner,
}

impl Packable for L1Validator {
    fn pack(&self, w: &mut Writer) {
        w.bytes(&self.node_id.to_vec());
        w.u64(self.weight);
        w.u64(self.balance);
        w.fixed(&self.signer.public_key);
        w.fixed(&self.signer.signature);
        self.remaining_balance_owner.pack(w);
        self.deactivation_owner.pack(w);
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let node_id = NodeId::from_slice(&r.bytes()?);
        let weight = r.u64()?;
        let balance = r.u64()?;
        let mut public_key = [0u8; BLS_PUBLIC_KEY_LEN];
        public_key.copy_from_slice(&r.fixed(BLS_PUBLIC_KEY_LEN)?);
        let mut signature = [0u8; BLS_SIGNATURE_LEN];
        signature.copy_from_slice(&r.fixed(BLS_SIGNATURE_LEN)?);
        Ok(Self {
            node_id,
            weight,
            balance,
            signer: ProofOfPossession {
                public_key,
                signature,
            },
            remaining_balance_owner: PChainOwner::unpack(r)?,
            deactivation_owner: PChainOwner::unpack(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSubnetToL1Tx {
    pub base: BaseTx,
    pub subnet_id: Id,
    pub chain_id: Id,
    pub manager_address: Vec<u8>,
    pub validators: Vec<L1Validator>,
    pub subnet_auth: SubnetAuth,
}

/// Kind tag of an unsigned transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    CreateSubnet,
    CreateChain,
    AddValidator,
    AddSubnetValidator,
    RemoveSubnetValidator,
    TransferSubnetOwnership,
    ConvertSubnetToL1,
}

impl TxKind {
    /// Whether transactions of this kind carry a subnet authorization
    pub fn requires_subnet_auth(&self) -> bool {
        !matches!(self, TxKind::CreateSubnet | TxKind::AddValidator)
    }

    /// Codec type id of the unsigned body
    pub fn type_id(&self) -> u32 {
        match self {
            TxKind::CreateSubnet => type_id::CREATE_SUBNET_TX,
            TxKind::CreateChain => type_id::CREATE_CHAIN_TX,
            TxKind::AddValidator => type_id::ADD_VALIDATOR_TX,
            TxKind::AddSubnetValidator => type_id::ADD_SUBNET_VALIDATOR_TX,
            TxKind::RemoveSubnetValidator => type_id::REMOVE_SUBNET_VALIDATOR_TX,
            TxKind::TransferSubnetOwnership => type_id::TRANSFER_SUBNET_OWNERSHIP_TX,
            TxKind::ConvertSubnetToL1 => type_id::CONVERT_SUBNET_TO_L1_TX,
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxKind::CreateSubnet => "CreateSubnetTx",
            TxKind::CreateChain => "CreateChainTx",
            TxKind::AddValidator => "AddValidatorTx",
            TxKind::AddSubnetValidator => "AddSubnetValidatorTx",
            TxKind::RemoveSubnetValidator => "RemoveSubnetValidatorTx",
            TxKind::TransferSubnetOwnership => "TransferSubnetOwnershipTx",
            TxKind::ConvertSubnetToL1 => "ConvertSubnetToL1Tx",
        };
        f.write_str(name)
    }
}

/// The closed set of transactions this tool builds, signs and commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsignedTx {
    CreateSubnet(CreateSubnetTx),
    CreateChain(CreateChainTx),
    AddValidator(AddValidatorTx),
    AddSubnetValidator(AddSubnetValidatorTx),
    RemoveSubnetValidator(RemoveSubnetValidatorTx),
    TransferSubnetOwnership(TransferSubnetOwnershipTx),
    ConvertSubnetToL1(ConvertSubnetToL1Tx),
}

impl UnsignedTx {
    pub fn kind(&self) -> TxKind {
        match self {
            UnsignedTx::CreateSubnet(_) => TxKind::CreateSubnet,
            UnsignedTx::CreateChain(_) => TxKind::CreateChain,
            UnsignedTx::AddValidator(_) => TxKind::AddValidator,
            UnsignedTx::AddSubnetValidator(_) => TxKind::AddSubnetValidator,
            UnsignedTx::RemoveSubnetValidator(_) => TxKind::RemoveSubnetValidator,
            UnsignedTx::TransferSubnetOwnership(_) => TxKind::TransferSubnetOwnership,
            UnsignedTx::ConvertSubnetToL1(_) => TxKind::ConvertSubnetToL1,
        }
    }

    pub fn base(&self) -> &BaseTx {
        match self {
            UnsignedTx::CreateSubnet(tx) => &tx.base,
            UnsignedTx::CreateChain(tx) => &tx.base,
            UnsignedTx::AddValidator(tx) => &tx.base,
            UnsignedTx::AddSubnetValidator(tx) => &tx.base,
            UnsignedTx::RemoveSubnetValidator(tx) => &tx.base,
            UnsignedTx::TransferSubnetOwnership(tx) => &tx.base,
            UnsignedTx::ConvertSubnetToL1(tx) => &tx.base,
        }
    }

    pub fn network_id(&self) -> u32 {
        self.base().network_id
    }

    /// Subnet this transaction acts on, if any
    pub fn subnet_id(&self) -> Option<Id> {
        match self {
            UnsignedTx::CreateSubnet(_) | UnsignedTx::AddValidator(_) => None,
            UnsignedTx::CreateChain(tx) => Some(tx.subnet_id),
            UnsignedTx::AddSubnetValidator(tx) => Some(tx.subnet_id),
            UnsignedTx::RemoveSubnetValidator(tx) => Some(tx.subnet_id),
            UnsignedTx::TransferSubnetOwnership(tx) => Some(tx.subnet_id),
            UnsignedTx::ConvertSubnetToL1(tx) => Some(tx.subnet_id),
        }
    }

    pub fn subnet_auth(&self) -> Option<&SubnetAuth> {
        match self {
            UnsignedTx::CreateSubnet(_) | UnsignedTx::AddValidator(_) => None,
            UnsignedTx::CreateChain(tx) => Some(&tx.subnet_auth),
            UnsignedTx::AddSubnetValidator(tx) => Some(&tx.subnet_auth),
            UnsignedTx::RemoveSubnetValidator(tx) => Some(&tx.subnet_auth),
            UnsignedTx::TransferSubnetOwnership(tx) => Some(&tx.subnet_auth),
            UnsignedTx::ConvertSubnetToL1(tx) => Some(&tx.subnet_auth),
        }
    }

    /// Blockchain referenced by the transaction body, if any
    pub fn blockchain_id(&self) -> Option<Id> {
        match self {
            UnsignedTx::ConvertSubnetToL1(tx) => Some(tx.chain_id),
            _ => None,
        }
    }

    /// Short human description used when listing pending transactions
    pub fn display_name(&self) -> String {
        match self {
            UnsignedTx::CreateSubnet(_) => "create subnet".to_string(),
            UnsignedTx::CreateChain(tx) => format!("create blockchain {}", tx.chain_name),
            UnsignedTx::AddValidator(tx) => {
                format!("add primary validator {}", tx.validator.node_id)
            }
            UnsignedTx::AddSubnetValidator(tx) => {
                format!("add subnet validator {}", tx.validator.node_id)
            }
            UnsignedTx::RemoveSubnetValidator(tx) => {
                format!("remove subnet validator {}", tx.node_id)
            }
            UnsignedTx::TransferSubnetOwnership(_) => "transfer subnet ownership".to_string(),
            UnsignedTx::ConvertSubnetToL1(_) => "convert subnet to L1".to_string(),
        }
    }

    /// Type id followed by the body
    fn pack(&self, w: &mut Writer) {
        w.u32(self.kind().type_id());
        match self {
            UnsignedTx::CreateSubnet(tx) => {
                tx.base.pack(w);
                tx.owner.pack(w);
            }
            UnsignedTx::CreateChain(tx) => {
                tx.base.pack(w);
                w.id(&tx.subnet_id);
                w.str(&tx.chain_name);
                w.id(&tx.vm_id);
                w.count(tx.fx_ids.len());
                for fx_id in &tx.fx_ids {
                    w.id(fx_id);
                }
                w.bytes(&tx.genesis);
                tx.subnet_auth.pack(w);
            }
            UnsignedTx::AddValidator(tx) => {
                tx.base.pack(w);
                tx.validator.pack(w);
                pack_list(w, &tx.stake);
                tx.rewards_owner.pack(w);
                w.u32(tx.delegation_shares);
            }
            UnsignedTx::AddSubnetValidator(tx) => {
                tx.base.pack(w);
                tx.validator.pack(w);
                w.id(&tx.subnet_id);
                tx.subnet_auth.pack(w);
            }
            UnsignedTx::RemoveSubnetValidator(tx) => {
                tx.base.pack(w);
                w.node_id(&tx.node_id);
                w.id(&tx.subnet_id);
                tx.subnet_auth.pack(w);
            }
            UnsignedTx::TransferSubnetOwnership(tx) => {
                tx.base.pack(w);
                w.id(&tx.subnet_id);
                tx.subnet_auth.pack(w);
                tx.owner.pack(w);
            }
            UnsignedTx::ConvertSubnetToL1(tx) => {
                tx.base.pack(w);
                w.id(&tx.subnet_id);
                w.id(&tx.chain_id);
                w.bytes(&tx.manager_address);
                pack_list(w, &tx.validators);
                tx.subnet_auth.pack(w);
            }
        }
    }

    fn unpack(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let tx = match r.u32()? {
            type_id::CREATE_SUBNET_TX => UnsignedTx::CreateSubnet(CreateSubnetTx {
                base: BaseTx::unpack(r)?,
                owner: OutputOwners::unpack(r)?,
            }),
            type_id::CREATE_CHAIN_TX => {
                let base = BaseTx::unpack(r)?;
                let subnet_id = r.id()?;
                let chain_name = r.str()?;
                let vm_id = r.id()?;
                let fx_count = r.count()?;
                let fx_ids = (0..fx_count)
                    .map(|_| r.id())
                    .collect::<Result<Vec<_>, _>>()?;
                UnsignedTx::CreateChain(CreateChainTx {
                    base,
                    subnet_id,
                    chain_name,
                    vm_id,
                    fx_ids,
                    genesis: r.bytes()?,
                    subnet_auth: SubnetAuth::unpack(r)?,
                })
            }
            type_id::ADD_VALIDATOR_TX => UnsignedTx::AddValidator(AddValidatorTx {
                base: BaseTx::unpack(r)?,
                validator: Validator::unpack(r)?,
                stake: unpack_list(r)?,
                rewards_owner: OutputOwners::unpack(r)?,
                delegation_shares: r.u32()?,
            }),
            type_id::ADD_SUBNET_VALIDATOR_TX => {
                UnsignedTx::AddSubnetValidator(AddSubnetValidatorTx {
                    base: BaseTx::unpack(r)?,
                    validator: Validator::unpack(r)?,
                    subnet_id: r.id()?,
                    subnet_auth: SubnetAuth::unpack(r)?,
                })
            }
            type_id::REMOVE_SUBNET_VALIDATOR_TX => {
                UnsignedTx::RemoveSubnetValidator(RemoveSubnetValidatorTx {
                    base: BaseTx::unpack(r)?,
                    node_id: r.node_id()?,
                    subnet_id: r.id()?,
                    subnet_auth: SubnetAuth::unpack(r)?,
                })
            }
            type_id::TRANSFER_SUBNET_OWNERSHIP_TX => {
                UnsignedTx::TransferSubnetOwnership(TransferSubnetOwnershipTx {
                    base: BaseTx::unpack(r)?,
                    subnet_id: r.id()?,
                    subnet_auth: SubnetAuth::unpack(r)?,
                    owner: OutputOwners::unpack(r)?,
                })
            }
            type_id::CONVERT_SUBNET_TO_L1_TX => {
                UnsignedTx::ConvertSubnetToL1(ConvertSubnetToL1Tx {
                    base: BaseTx::unpack(r)?,
                    subnet_id: r.id()?,
                    chain_id: r.id()?,
                    manager_address: r.bytes()?,
                    validators: unpack_list(r)?,
                    subnet_auth: SubnetAuth::unpack(r)?,
                })
            }
            found => {
                return Err(CodecError::UnexpectedType {
                    what: "unsigned tx",
                    found,
                })
            }
        };
        Ok(tx)
    }

    /// Codec version, type id and body
    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::versioned();
        self.pack(&mut w);
        w.into_bytes()
    }

    /// Digest every signer signs
    pub fn signing_digest(&self) -> [u8; 32] {
        sha256(&self.bytes())
    }
}

// =============================================================================
// Signed transaction
// =============================================================================

/// Transaction plus its (possibly partial) credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub unsigned: UnsignedTx,
    pub creds: Vec<Credential>,
}

impl Tx {
    /// Wrap an unsigned transaction with empty credentials sized to its
    /// inputs and subnet authorization
    pub fn new(unsigned: UnsignedTx) -> Self {
        let mut creds: Vec<Credential> = unsigned
            .base()
            .inputs
            .iter()
            .map(|input| Credential::with_slots(input.sig_indices.len()))
            .collect();
        if let Some(auth) = unsigned.subnet_auth() {
            creds.push(Credential::with_slots(auth.sig_indices.len()));
        }
        Self { unsigned, creds }
    }

    pub fn kind(&self) -> TxKind {
        self.unsigned.kind()
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut w = Writer::versioned();
        self.unsigned.pack(&mut w);
        pack_list(&mut w, &self.creds);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::versioned(bytes)?;
        let unsigned = UnsignedTx::unpack(&mut r)?;
        let creds = unpack_list(&mut r)?;
        r.finish()?;
        Ok(Self { unsigned, creds })
    }

    /// Transaction id: SHA-256 of the signed bytes
    pub fn id(&self) -> Id {
        Id::from_slice(&sha256(&self.bytes()))
    }

    /// Index of the subnet authorization credential, if the kind has one
    pub fn subnet_auth_cred_index(&self) -> Option<usize> {
        self.unsigned
            .subnet_auth()
            .map(|_| self.unsigned.base().inputs.len())
    }

    /// Store `sig` in an empty slot. Returns `false` without touching the
    /// slot when it already holds a signature.
    pub fn fill_signature(
        &mut self,
        cred: usize,
        slot: usize,
        sig: Signature,
    ) -> Result<bool, TxError> {
        let count = self.creds.len();
        let credential = self
            .creds
            .get_mut(cred)
            .ok_or(TxError::CredentialOutOfRange { index: cred, count })?;
        let len = credential.sigs.len();
        let target = credential
            .sigs
            .get_mut(slot)
            .ok_or(TxError::SlotOutOfRange { cred, slot, len })?;
        if !target.is_empty() {
            return Ok(false);
        }
        *target = sig;
        Ok(true)
    }
}
