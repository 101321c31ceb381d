//! Hashing and checksummed hex
//!
//! SHA-256 plus the `0x`-prefixed checksummed hex avalanchego uses for
//! `encoding: "hex"` payloads (UTXOs, issued transactions, tx files).

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the trailing checksum appended to hex payloads
pub const CHECKSUM_LEN: usize = 4;

/// Errors decoding a checksummed string
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
    #[error("Missing 0x prefix")]
    MissingHexPrefix,
    #[error("Input too short for checksum: {0} bytes")]
    TooShort(usize),
    #[error("Checksum mismatch")]
    BadChecksum,
}

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Last four bytes of SHA-256 over `data`
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = sha256(data);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[32 - CHECKSUM_LEN..]);
    out
}

/// Encode bytes as `0x`-prefixed hex with a trailing checksum
pub fn checksummed_hex_encode(data: &[u8]) -> String {
    let mut buf = Vec::with_capacity(data.len() + CHECKSUM_LEN);
    buf.extend_from_slice(data);
    buf.extend_from_slice(&checksum(data));
    format!("0x{}", hex::encode(buf))
}

/// Decode `0x`-prefixed checksummed hex
pub fn checksummed_hex_decode(s: &str) -> Result<Vec<u8>, EncodingError> {
    let body = s.strip_prefix("0x").ok_or(EncodingError::MissingHexPrefix)?;
    let raw = hex::decode(body).map_err(|e| EncodingError::InvalidHex(e.to_string()))?;
    if raw.len() < CHECKSUM_LEN {
        return Err(EncodingError::TooShort(raw.len()));
    }
    let (payload, sum) = raw.split_at(raw.len() - CHECKSUM_LEN);
    if checksum(payload) != sum {
        return Err(EncodingError::BadChecksum);
    }
    Ok(payload.to_vec())
}
