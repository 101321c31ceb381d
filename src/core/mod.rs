//! Core P-Chain components
//!
//! This module contains the fundamental building blocks:
//! - Identifiers (ids, short ids, node ids) and bech32 addresses
//! - Target networks
//! - Transactions (tagged union of supported kinds, credentials, UTXOs)
//! - The binary codec used for signing, issuing and transaction files

pub mod codec;
pub mod ids;
pub mod network;
pub mod transaction;

pub use codec::{CodecError, Reader, Writer, CODEC_VERSION};
pub use ids::{content_id, format_address, parse, parse_address, Id, IdError, NodeId, ShortId};
pub use network::Network;
pub use transaction::{
    AddSubnetValidatorTx, AddValidatorTx, BaseTx, ConvertSubnetToL1Tx, CreateChainTx,
    CreateSubnetTx, Credential, L1Validator, OutputOwners, PChainOwner, Packable,
    ProofOfPossession, RemoveSubnetValidatorTx, Signature, SubnetAuth, TransferSubnetOwnershipTx,
    TransferableInput, TransferableOutput, Tx, TxError, TxKind, UnsignedTx, Utxo, UtxoId,
    Validator,
};
