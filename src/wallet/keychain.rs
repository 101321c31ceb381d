//! Keychain and signer abstraction

use std::collections::BTreeMap;

use crate::core::{ShortId, Signature};
use crate::crypto::{KeyError, KeyPair};

/// Private key prefunded in every local network genesis
pub const LOCAL_FUNDED_KEY_HEX: &str =
    "56289e99c94b6912bfc12adc093c9b51124f0dc54ac7a766b2bc5ccf558d8027";

/// Something that can produce signatures for a set of addresses
pub trait Signer: Send + Sync {
    fn addresses(&self) -> Vec<ShortId>;

    fn contains(&self, addr: &ShortId) -> bool;

    /// Sign `digest` with the key for `addr`, or `None` if that key is not held
    fn sign(&self, addr: &ShortId, digest: &[u8; 32]) -> Result<Option<Signature>, KeyError>;
}

/// In-memory set of secp256k1 keys indexed by address
#[derive(Debug, Clone, Default)]
pub struct Keychain {
    keys: BTreeMap<ShortId, KeyPair>,
}

impl Keychain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = KeyPair>) -> Self {
        let mut keychain = Self::new();
        for key in keys {
            keychain.add(key);
        }
        keychain
    }

    /// Keychain holding the local network's prefunded key
    pub fn local_funded() -> Result<Self, KeyError> {
        Ok(Self::from_keys([KeyPair::from_private_key_hex(
            LOCAL_FUNDED_KEY_HEX,
        )?]))
    }

    /// Add a key; returns its address
    pub fn add(&mut self, key: KeyPair) -> ShortId {
        let addr = key.short_id();
        self.keys.insert(addr.clone(), key);
        addr
    }

    pub fn get(&self, addr: &ShortId) -> Option<&KeyPair> {
        self.keys.get(addr)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Signer for Keychain {
    fn addresses(&self) -> Vec<ShortId> {
        self.keys.keys().cloned().collect()
    }

    fn contains(&self, addr: &ShortId) -> bool {
        self.keys.contains_key(addr)
    }

    fn sign(&self, addr: &ShortId, digest: &[u8; 32]) -> Result<Option<Signature>, KeyError> {
        match self.keys.get(addr) {
            Some(key) => Ok(Some(Signature::new(key.sign_digest(digest)?))),
            None => Ok(None),
        }
    }
}
