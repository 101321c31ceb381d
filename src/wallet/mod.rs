//! Wallet module: keys, local UTXO state, tx building and issuance

pub mod backend;
pub mod builder;
pub mod keychain;
pub mod keystore;
pub mod wallet;

pub use backend::Backend;
pub use builder::{subnet_auth_for, Builder, FeeConfig, NANO_AVAX_PER_AVAX};
pub use keychain::{Keychain, Signer, LOCAL_FUNDED_KEY_HEX};
pub use keystore::{KeyInfo, KeyStore};
pub use wallet::{
    Wallet, WalletError, WalletOptions, DEFAULT_CONFIRM_TIMEOUT, DEFAULT_POLL_FREQUENCY,
};
