//! Transaction artifact exchanged between signers
//!
//! On disk an artifact is the `0x`-prefixed checksummed hex of the codec
//! bytes of a [`Tx`]. Loading and saving an unchanged artifact reproduces
//! the file byte for byte; signing only ever fills empty signature slots.

use std::fs;
use std::path::Path;

use super::coordinator::MultisigError;
use super::signers::{remaining_signers, SignerSet};
use crate::core::{Id, Network, ShortId, Tx, TxKind};
use crate::crypto::{checksummed_hex_decode, checksummed_hex_encode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxArtifact {
    tx: Tx,
    committed: bool,
}

impl TxArtifact {
    pub fn new(tx: Tx) -> Self {
        Self {
            tx,
            committed: false,
        }
    }

    pub fn tx(&self) -> &Tx {
        &self.tx
    }

    pub(crate) fn tx_mut(&mut self) -> &mut Tx {
        &mut self.tx
    }

    pub fn kind(&self) -> TxKind {
        self.tx.kind()
    }

    pub fn network(&self) -> Result<Network, MultisigError> {
        let id = self.tx.unsigned.network_id();
        Network::from_network_id(id).ok_or(MultisigError::UnknownNetwork(id))
    }

    pub fn subnet_id(&self) -> Option<Id> {
        self.tx.unsigned.subnet_id()
    }

    pub fn blockchain_id(&self) -> Option<Id> {
        self.tx.unsigned.blockchain_id()
    }

    pub fn display_name(&self) -> String {
        self.tx.unsigned.display_name()
    }

    pub fn id(&self) -> Id {
        self.tx.id()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub fn signer_set(&self, control_keys: &[ShortId]) -> Result<SignerSet, MultisigError> {
        remaining_signers(&self.tx, control_keys)
    }

    pub fn is_ready_to_commit(&self, control_keys: &[ShortId]) -> Result<bool, MultisigError> {
        Ok(self.signer_set(control_keys)?.is_complete())
    }

    pub fn to_file_string(&self) -> String {
        checksummed_hex_encode(&self.tx.bytes())
    }

    pub fn from_file_string(contents: &str) -> Result<Self, MultisigError> {
        let bytes = checksummed_hex_decode(contents.trim())?;
        Ok(Self::new(Tx::from_bytes(&bytes)?))
    }

    pub fn load(path: &Path) -> Result<Self, MultisigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_file_string(&contents)
    }

    /// Write atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<(), MultisigError> {
        let contents = self.to_file_string();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;
    use crate::core::{
        BaseTx, CreateChainTx, Signature, SubnetAuth, TransferableInput, UnsignedTx, UtxoId,
    };
    use crate::crypto::SIGNATURE_LEN;

    fn artifact() -> TxArtifact {
        TxArtifact::new(Tx::new(UnsignedTx::CreateChain(CreateChainTx {
            base: BaseTx {
                network_id: 5,
                inputs: vec![TransferableInput {
                    utxo_id: UtxoId {
                        tx_id: content_id(b"funding"),
                        output_index: 1,
                    },
                    asset_id: content_id(b"AVAX"),
                    amount: 500,
                    sig_indices: vec![0],
                }],
                ..Default::default()
            },
            subnet_id: content_id(b"subnet"),
            chain_name: "mychain".to_string(),
            vm_id: content_id(b"vm"),
            fx_ids: vec![],
            genesis: br#"{"config":{}}"#.to_vec(),
            subnet_auth: SubnetAuth::new(vec![0, 1]).unwrap(),
        })))
    }

    #[test]
    fn test_save_load_is_byte_identical() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("tx.txt");

        let mut original = artifact();
        original
            .tx_mut()
            .fill_signature(1, 0, Signature::new([3u8; SIGNATURE_LEN]))
            .unwrap();
        original.save(&path).unwrap();
        let first = fs::read(&path).unwrap();

        let loaded = TxArtifact::load(&path).unwrap();
        assert_eq!(loaded.tx(), original.tx());
        loaded.save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
        assert!(!temp_dir.path().join("tx.tmp").exists());
    }

    #[test]
    fn test_metadata() {
        let artifact = artifact();
        assert_eq!(artifact.kind(), TxKind::CreateChain);
        assert_eq!(artifact.network().unwrap(), Network::Testnet);
        assert_eq!(artifact.subnet_id(), Some(content_id(b"subnet")));
        assert!(!artifact.is_committed());
    }

    #[test]
    fn test_corrupted_file_is_rejected() {
        let encoded = artifact().to_file_string();
        let mut corrupted = encoded.into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'0' { b'1' } else { b'0' };
        let corrupted = String::from_utf8(corrupted).unwrap();

        assert!(matches!(
            TxArtifact::from_file_string(&corrupted),
            Err(MultisigError::Encoding(_))
        ));
    }

    #[test]
    fn test_unknown_network() {
        let mut artifact = artifact();
        if let UnsignedTx::CreateChain(tx) = &mut artifact.tx_mut().unsigned {
            tx.base.network_id = 99;
        }
        assert!(matches!(
            artifact.network(),
            Err(MultisigError::UnknownNetwork(99))
        ));
    }
}
