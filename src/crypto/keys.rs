//! secp256k1 key management
//!
//! Keys are `avalanche-types` secp256k1 keys. They sign 32-byte digests with
//! recoverable signatures (`r || s || v`, 65 bytes), so any party holding a
//! signature and the digest can recover the signer's address without
//! knowing the public key up front.

use avalanche_types::key::secp256k1::{private_key, public_key};
use thiserror::Error;

use crate::core::ids::ShortId;

/// Length of a recoverable signature
pub const SIGNATURE_LEN: usize = 65;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("private key must be 32 hex-encoded bytes")]
    MalformedPrivateKey,
    #[error("signature does not recover to a public key: {0}")]
    Unrecoverable(String),
    #[error("key operation failed: {0}")]
    Key(String),
}

/// Signing key and the address it controls
#[derive(Clone)]
pub struct KeyPair {
    key: private_key::Key,
    address: ShortId,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    pub fn generate() -> Result<Self, KeyError> {
        let key = private_key::Key::generate().map_err(|e| KeyError::Key(e.to_string()))?;
        Self::from_key(key)
    }

    fn from_key(key: private_key::Key) -> Result<Self, KeyError> {
        let address = key
            .to_public_key()
            .to_short_id()
            .map_err(|e| KeyError::Key(e.to_string()))?;
        Ok(Self { key, address })
    }

    /// Parse the contents of a `.pk` key file; `0x` and surrounding
    /// whitespace are accepted
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let body = hex_key.trim();
        let body = body.strip_prefix("0x").unwrap_or(body);
        let bytes = hex::decode(body).map_err(|_| KeyError::MalformedPrivateKey)?;
        if bytes.len() != 32 {
            return Err(KeyError::MalformedPrivateKey);
        }
        let key = private_key::Key::from_bytes(&bytes).map_err(|_| KeyError::MalformedPrivateKey)?;
        Self::from_key(key)
    }

    /// Key file contents
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    /// Short address bytes: RIPEMD160(SHA256(compressed pubkey))
    pub fn short_id(&self) -> ShortId {
        self.address.clone()
    }

    /// Sign a 32-byte digest, returning a 65-byte recoverable signature
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; SIGNATURE_LEN], KeyError> {
        let sig = self
            .key
            .sign_digest(digest)
            .map_err(|e| KeyError::Key(e.to_string()))?;
        let bytes = sig.to_bytes();
        <[u8; SIGNATURE_LEN]>::try_from(&bytes[..]).map_err(|_| {
            KeyError::Key(format!("signature is {} bytes", bytes.len()))
        })
    }
}

/// Recover the short address that produced `signature` over `digest`
pub fn recover_short_id(
    digest: &[u8; 32],
    signature: &[u8; SIGNATURE_LEN],
) -> Result<ShortId, KeyError> {
    public_key::Key::from_signature(digest, signature)
        .and_then(|key| key.to_short_id())
        .map_err(|e| KeyError::Unrecoverable(e.to_string()))
}
