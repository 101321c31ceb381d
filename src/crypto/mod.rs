//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and checksummed hex
//! - secp256k1 key management with recoverable signatures

pub mod hash;
pub mod keys;

pub use hash::{checksummed_hex_decode, checksummed_hex_encode, sha256, EncodingError};
pub use keys::{recover_short_id, KeyError, KeyPair, SIGNATURE_LEN};
