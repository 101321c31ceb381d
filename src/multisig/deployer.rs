//! Partial-signing deployer
//!
//! Builds subnet-authorized transactions with a chosen set of auth keys,
//! signs what the local wallet can, and commits straight away when nothing
//! else is needed. Otherwise the partially signed artifact is handed back
//! for the caller to save and pass on.

use super::artifact::TxArtifact;
use super::coordinator::{MultisigCoordinator, MultisigError};
use crate::core::{Id, NodeId, ShortId, Tx, Validator};
use crate::wallet::Wallet;

#[derive(Debug)]
pub enum DeployOutcome {
    Committed(Id),
    PartiallySigned(TxArtifact),
}

pub struct PublicDeployer {
    coordinator: MultisigCoordinator,
}

impl PublicDeployer {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            coordinator: MultisigCoordinator::new(wallet),
        }
    }

    pub fn coordinator(&self) -> &MultisigCoordinator {
        &self.coordinator
    }

    pub fn into_wallet(self) -> Wallet {
        self.coordinator.into_wallet()
    }

    pub async fn deploy_blockchain(
        &mut self,
        subnet_id: Id,
        auth_keys: &[ShortId],
        chain_name: &str,
        vm_id: Id,
        genesis: Vec<u8>,
    ) -> Result<DeployOutcome, MultisigError> {
        let control_keys = self.coordinator.get_owners(subnet_id).await?.control_keys;
        log::info!("deploying {} to subnet {}", chain_name, subnet_id);
        let tx = self
            .coordinator
            .wallet()
            .build_create_chain_tx(subnet_id, auth_keys, genesis, vm_id, chain_name)
            .await?;
        self.finish(tx, &control_keys).await
    }

    pub async fn add_validator(
        &mut self,
        subnet_id: Id,
        auth_keys: &[ShortId],
        validator: Validator,
    ) -> Result<DeployOutcome, MultisigError> {
        let control_keys = self.coordinator.get_owners(subnet_id).await?.control_keys;
        log::info!("adding validator {} to subnet {}", validator.node_id, subnet_id);
        let tx = self
            .coordinator
            .wallet()
            .build_add_subnet_validator_tx(validator, subnet_id, auth_keys)
            .await?;
        self.finish(tx, &control_keys).await
    }

    pub async fn remove_validator(
        &mut self,
        subnet_id: Id,
        auth_keys: &[ShortId],
        node_id: NodeId,
    ) -> Result<DeployOutcome, MultisigError> {
        let control_keys = self.coordinator.get_owners(subnet_id).await?.control_keys;
        log::info!("removing validator {} from subnet {}", node_id, subnet_id);
        let tx = self
            .coordinator
            .wallet()
            .build_remove_subnet_validator_tx(node_id, subnet_id, auth_keys)
            .await?;
        self.finish(tx, &control_keys).await
    }

    async fn finish(
        &mut self,
        tx: Tx,
        control_keys: &[ShortId],
    ) -> Result<DeployOutcome, MultisigError> {
        let mut artifact = TxArtifact::new(tx);
        let set = self.coordinator.remaining_signers(&artifact, control_keys)?;
        if !set.is_complete() {
            log::info!(
                "{} has {} of {} subnet auth signatures",
                artifact.display_name(),
                set.signed_count(),
                set.required().len()
            );
            return Ok(DeployOutcome::PartiallySigned(artifact));
        }
        let tx_id = self.coordinator.commit(&mut artifact).await?;
        Ok(DeployOutcome::Committed(tx_id))
    }
}
