//! Sidecar persistence
//!
//! A sidecar is the per-blockchain metadata record kept under
//! `<base>/subnets/<name>/sidecar.json`: the VM it runs and the subnet and
//! blockchain ids it was deployed under on each network.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Id, Network};

const SIDECAR_FILE: &str = "sidecar.json";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("No sidecar for blockchain {0:?}")]
    NotFound(String),
    #[error("Invalid blockchain name {0:?}")]
    InvalidName(String),
}

/// Ids of one deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rpc_endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sidecar {
    pub name: String,
    pub vm: String,
    /// Most recent local deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_id: Option<Id>,
    /// Deployments keyed by network name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkData>,
}

impl Sidecar {
    pub fn new(name: &str, vm: &str) -> Self {
        Self {
            name: name.to_string(),
            vm: vm.to_string(),
            subnet_id: None,
            blockchain_id: None,
            networks: BTreeMap::new(),
        }
    }

    pub fn network(&self, network: Network) -> Option<&NetworkData> {
        self.networks.get(network.name())
    }

    pub fn set_subnet_id(&mut self, network: Network, subnet_id: Id) {
        self.networks
            .entry(network.name().to_string())
            .or_default()
            .subnet_id = Some(subnet_id);
        if network == Network::Local {
            self.subnet_id = Some(subnet_id);
        }
    }

    pub fn set_blockchain_id(&mut self, network: Network, blockchain_id: Id) {
        self.networks
            .entry(network.name().to_string())
            .or_default()
            .blockchain_id = Some(blockchain_id);
        if network == Network::Local {
            self.blockchain_id = Some(blockchain_id);
        }
    }

    /// Merge `endpoints` into the network's RPC endpoint list, sorted
    pub fn add_rpc_endpoints(&mut self, network: Network, endpoints: &[String]) {
        let data = self.networks.entry(network.name().to_string()).or_default();
        data.rpc_endpoints.extend_from_slice(endpoints);
        data.rpc_endpoints.sort();
        data.rpc_endpoints.dedup();
    }
}

/// Manager for the sidecar directory tree
pub struct SidecarStore {
    subnets_dir: PathBuf,
}

impl SidecarStore {
    pub fn new(subnets_dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(subnets_dir)?;
        Ok(Self {
            subnets_dir: subnets_dir.to_path_buf(),
        })
    }

    fn sidecar_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.subnets_dir.join(name).join(SIDECAR_FILE))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.sidecar_path(name).map(|p| p.exists()).unwrap_or(false)
    }

    pub fn load(&self, name: &str) -> Result<Sidecar, StorageError> {
        let path = self.sidecar_path(name)?;
        if !path.exists() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let reader = BufReader::new(fs::File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load the sidecar for `name`, or start a fresh one running `vm`
    pub fn load_or_new(&self, name: &str, vm: &str) -> Result<Sidecar, StorageError> {
        match self.load(name) {
            Err(StorageError::NotFound(_)) => Ok(Sidecar::new(name, vm)),
            other => other,
        }
    }

    pub fn save(&self, sidecar: &Sidecar) -> Result<(), StorageError> {
        let path = self.sidecar_path(&sidecar.name)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.subnets_dir.clone());
        fs::create_dir_all(&dir)?;

        // Write to temporary file first
        let temp_path = dir.join("sidecar.tmp");
        let writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(writer, sidecar)?;

        // Atomic rename
        fs::rename(&temp_path, &path)?;
        log::debug!("saved sidecar {}", path.display());
        Ok(())
    }

    /// Record a deployment's ids and persist
    pub fn update_network(
        &self,
        name: &str,
        network: Network,
        subnet_id: Option<Id>,
        blockchain_id: Option<Id>,
    ) -> Result<Sidecar, StorageError> {
        let mut sidecar = self.load(name)?;
        if let Some(id) = subnet_id {
            sidecar.set_subnet_id(network, id);
        }
        if let Some(id) = blockchain_id {
            sidecar.set_blockchain_id(network, id);
        }
        self.save(&sidecar)?;
        Ok(sidecar)
    }

    /// Names of all stored sidecars, sorted
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.subnets_dir)? {
            let entry = entry?;
            if entry.path().join(SIDECAR_FILE).exists() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(&temp_dir.path().join("subnets")).unwrap();

        let mut sidecar = Sidecar::new("mychain", "timestampvm");
        sidecar.set_subnet_id(Network::Testnet, content_id(b"subnet"));
        store.save(&sidecar).unwrap();

        assert!(store.exists("mychain"));
        assert_eq!(store.load("mychain").unwrap(), sidecar);
        assert!(!temp_dir
            .path()
            .join("subnets/mychain/sidecar.tmp")
            .exists());
    }

    #[test]
    fn test_update_network_keeps_other_networks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(temp_dir.path()).unwrap();
        let subnet = content_id(b"fuji-subnet");
        let chain = content_id(b"local-chain");

        let mut sidecar = Sidecar::new("mychain", "timestampvm");
        sidecar.set_subnet_id(Network::Testnet, subnet);
        store.save(&sidecar).unwrap();

        let updated = store
            .update_network("mychain", Network::Local, None, Some(chain))
            .unwrap();
        assert_eq!(updated.blockchain_id, Some(chain));
        assert_eq!(
            updated.network(Network::Testnet).unwrap().subnet_id,
            Some(subnet)
        );
        assert_eq!(
            updated.network(Network::Local).unwrap().blockchain_id,
            Some(chain)
        );
        assert_eq!(store.load("mychain").unwrap(), updated);
    }

    #[test]
    fn test_testnet_ids_do_not_touch_top_level() {
        let mut sidecar = Sidecar::new("mychain", "subnetevm");
        sidecar.set_blockchain_id(Network::Testnet, content_id(b"chain"));
        assert_eq!(sidecar.blockchain_id, None);
    }

    #[test]
    fn test_missing_and_invalid_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(temp_dir.path()).unwrap();

        assert!(matches!(store.load("absent"), Err(StorageError::NotFound(_))));
        assert!(matches!(
            store.load("../escape"),
            Err(StorageError::InvalidName(_))
        ));
        let fresh = store.load_or_new("absent", "timestampvm").unwrap();
        assert_eq!(fresh.vm, "timestampvm");
    }

    #[test]
    fn test_list_sorted() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SidecarStore::new(temp_dir.path()).unwrap();
        store.save(&Sidecar::new("zeta", "vm")).unwrap();
        store.save(&Sidecar::new("alpha", "vm")).unwrap();
        fs::create_dir_all(temp_dir.path().join("empty")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
    }
}
