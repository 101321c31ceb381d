//! Application configuration
//!
//! Loaded from `<base dir>/config.json` when present. Every field has a
//! default, so a partial file only overrides what it names.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::Network;
use crate::wallet::{WalletOptions, NANO_AVAX_PER_AVAX};

pub const CONFIG_FILE: &str = "config.json";
pub const KEYS_DIR: &str = "keys";
pub const SUBNETS_DIR: &str = "subnets";
const DEFAULT_BASE_DIR: &str = ".subnet-cli";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub runner_endpoint: String,
    pub local_endpoint: String,
    pub testnet_endpoint: String,
    pub mainnet_endpoint: String,
    pub request_timeout_secs: u64,
    pub dial_timeout_secs: u64,
    pub poll_frequency_secs: u64,
    pub readiness_interval_secs: u64,
    pub bootstrap_timeout_secs: u64,
    /// nAVAX
    pub min_bootstrap_balance: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            runner_endpoint: "http://127.0.0.1:8080".to_string(),
            local_endpoint: "http://127.0.0.1:9650".to_string(),
            testnet_endpoint: "https://api.avax-test.network".to_string(),
            mainnet_endpoint: "https://api.avax.network".to_string(),
            request_timeout_secs: 60,
            dial_timeout_secs: 10,
            poll_frequency_secs: 5,
            readiness_interval_secs: 10,
            bootstrap_timeout_secs: 600,
            min_bootstrap_balance: NANO_AVAX_PER_AVAX,
        }
    }
}

impl AppConfig {
    /// Read `<base_dir>/config.json`, falling back to defaults when absent
    pub fn load(base_dir: &Path) -> Result<Self, ConfigError> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn endpoint(&self, network: Network) -> &str {
        match network {
            Network::Local => &self.local_endpoint,
            Network::Testnet => &self.testnet_endpoint,
            Network::Mainnet => &self.mainnet_endpoint,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn readiness_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_interval_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn wallet_options(&self, network: Network) -> WalletOptions {
        WalletOptions {
            poll_frequency: Duration::from_secs(self.poll_frequency_secs),
            confirm_timeout: self.request_timeout(),
            ..WalletOptions::for_network(network)
        }
    }
}

/// `~/.subnet-cli`, or `.subnet-cli` in the working directory without a home
pub fn default_base_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_BASE_DIR),
        None => PathBuf::from(DEFAULT_BASE_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = tempdir().unwrap();
        let config = AppConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.min_bootstrap_balance, NANO_AVAX_PER_AVAX);
    }

    #[test]
    fn test_partial_file_overrides_named_fields() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE),
            r#"{"local_endpoint": "http://127.0.0.1:9652", "readiness_interval_secs": 2}"#,
        )
        .unwrap();

        let config = AppConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.endpoint(Network::Local), "http://127.0.0.1:9652");
        assert_eq!(config.readiness_interval(), Duration::from_secs(2));
        assert_eq!(config.bootstrap_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(temp_dir.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_wallet_options_follow_network() {
        let config = AppConfig::default();
        let options = config.wallet_options(Network::Testnet);
        assert_eq!(options.network_id, Network::Testnet.network_id());
        assert_eq!(options.poll_frequency, Duration::from_secs(5));
    }
}
