//! Identifiers and P-Chain addresses
//!
//! `Id` (32 bytes) names transactions, subnets and blockchains, `ShortId`
//! (20 bytes) names addresses and `NodeId` names validator nodes. All three
//! are the `avalanche-types` ids, so their CB58 text and serde forms match
//! avalanchego. Addresses are bech32 with a per-network HRP, e.g.
//! `P-custom18jma8ppw3nhx5r4ap8clazz0dps7rv5u9xde7p` on a local network.

use std::fmt::Display;
use std::str::FromStr;

use avalanche_types::{formatting, key::secp256k1::address};
use thiserror::Error;

use super::network::hrp_for_network_id;
use crate::crypto::sha256;

pub use avalanche_types::ids::node::Id as NodeId;
pub use avalanche_types::ids::short::Id as ShortId;
pub use avalanche_types::ids::Id;

/// Length of an [`Id`] in bytes
pub const ID_LEN: usize = avalanche_types::ids::LEN;

/// Alias of the chain every address in this crate lives on
pub const P_CHAIN_ALIAS: &str = "P";

/// Errors parsing or rendering identifiers
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid {kind} {input:?}: {detail}")]
    Invalid {
        kind: &'static str,
        input: String,
        detail: String,
    },
    #[error("Invalid length for {kind}: expected {expected} bytes, got {got}")]
    Length {
        kind: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Cannot format address: {0}")]
    Format(String),
}

/// Parse any id type from its text form
pub fn parse<T>(kind: &'static str, s: &str) -> Result<T, IdError>
where
    T: FromStr,
    T::Err: Display,
{
    s.trim().parse::<T>().map_err(|e| IdError::Invalid {
        kind,
        input: s.to_string(),
        detail: e.to_string(),
    })
}

/// Id of arbitrary bytes: SHA-256 of the input
pub fn content_id(data: &[u8]) -> Id {
    Id::from_slice(&sha256(data))
}

/// Render `addr` as a P-Chain address for `network_id`
pub fn format_address(addr: &ShortId, network_id: u32) -> Result<String, IdError> {
    formatting::address(P_CHAIN_ALIAS, hrp_for_network_id(network_id), &addr.as_ref().to_vec())
        .map_err(|e| IdError::Format(e.to_string()))
}

/// Parse a bech32 P-Chain address. The `P-` prefix is optional and the
/// HRP is not checked against any network.
pub fn parse_address(s: &str) -> Result<ShortId, IdError> {
    let trimmed = s.trim();
    let prefixed = if trimmed.starts_with("P-") {
        trimmed.to_string()
    } else {
        format!("{}-{}", P_CHAIN_ALIAS, trimmed)
    };
    let (_, bytes) = address::avax_address_to_short_bytes(P_CHAIN_ALIAS, &prefixed).map_err(
        |e| IdError::Invalid {
            kind: "address",
            input: s.to_string(),
            detail: e.to_string(),
        },
    )?;
    if bytes.len() != 20 {
        return Err(IdError::Length {
            kind: "address",
            expected: 20,
            got: bytes.len(),
        });
    }
    Ok(ShortId::from_slice(&bytes))
}
