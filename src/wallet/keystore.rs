//! Stored signing keys
//!
//! Keys live as `<keys dir>/<name>.pk`, each holding one hex-encoded
//! secp256k1 private key.

use std::fs;
use std::path::{Path, PathBuf};

use super::wallet::WalletError;
use crate::core::ShortId;
use crate::crypto::KeyPair;

const KEY_EXTENSION: &str = "pk";

/// Public key information (safe to share)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub address: ShortId,
}

/// Manager for the stored key directory
pub struct KeyStore {
    keys_dir: PathBuf,
}

impl KeyStore {
    pub fn new(keys_dir: &Path) -> Result<Self, WalletError> {
        fs::create_dir_all(keys_dir)?;
        Ok(Self {
            keys_dir: keys_dir.to_path_buf(),
        })
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.keys_dir.join(format!("{}.{}", name, KEY_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.key_path(name).exists()
    }

    /// Generate and store a new key under `name`
    pub fn create(&self, name: &str) -> Result<KeyInfo, WalletError> {
        self.import(name, KeyPair::generate()?)
    }

    /// Store an existing key under `name`
    pub fn import(&self, name: &str, key: KeyPair) -> Result<KeyInfo, WalletError> {
        let path = self.key_path(name);
        if path.exists() {
            return Err(WalletError::IoError(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("key {:?} already exists", name),
            )));
        }
        fs::write(&path, key.private_key_hex())?;
        log::info!("stored key {} at {}", name, path.display());
        Ok(KeyInfo {
            name: name.to_string(),
            address: key.short_id(),
        })
    }

    /// Import a key from a file containing a hex private key
    pub fn import_file(&self, name: &str, file: &Path) -> Result<KeyInfo, WalletError> {
        let contents = fs::read_to_string(file)?;
        let key = KeyPair::from_private_key_hex(&contents)?;
        self.import(name, key)
    }

    pub fn load(&self, name: &str) -> Result<KeyPair, WalletError> {
        let contents = fs::read_to_string(self.key_path(name))?;
        Ok(KeyPair::from_private_key_hex(&contents)?)
    }

    /// All stored keys, sorted by name; unreadable files are skipped
    pub fn list(&self) -> Result<Vec<KeyInfo>, WalletError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == KEY_EXTENSION).unwrap_or(false) {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match self.load(name) {
                    Ok(key) => keys.push(KeyInfo {
                        name: name.to_string(),
                        address: key.short_id(),
                    }),
                    Err(e) => log::warn!("skipping unreadable key {}: {}", path.display(), e),
                }
            }
        }

        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    pub fn delete(&self, name: &str) -> Result<(), WalletError> {
        fs::remove_file(self.key_path(name))?;
        Ok(())
    }
}
