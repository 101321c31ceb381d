//! Local view of wallet state: spendable UTXOs, issued transactions and
//! the owners of subnets this wallet created.
//!
//! The backend is fetched once when a wallet is bound and then kept current
//! by applying every transaction the wallet issues, so it stays valid when
//! the wallet is rebound to another endpoint.

use std::collections::BTreeMap;

use crate::core::{Id, OutputOwners, ShortId, Tx, UnsignedTx, Utxo, UtxoId};

#[derive(Debug, Clone, Default)]
pub struct Backend {
    utxos: BTreeMap<UtxoId, Utxo>,
    txs: BTreeMap<Id, Tx>,
    subnet_owners: BTreeMap<Id, OutputOwners>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_utxos(utxos: impl IntoIterator<Item = Utxo>) -> Self {
        let mut backend = Self::new();
        for utxo in utxos {
            backend.add_utxo(utxo);
        }
        backend
    }

    pub fn add_utxo(&mut self, utxo: Utxo) {
        self.utxos.insert(utxo.utxo_id, utxo);
    }

    pub fn utxo(&self, id: &UtxoId) -> Option<&Utxo> {
        self.utxos.get(id)
    }

    /// UTXOs in stable id order
    pub fn utxos(&self) -> impl Iterator<Item = &Utxo> {
        self.utxos.values()
    }

    pub fn tx(&self, id: &Id) -> Option<&Tx> {
        self.txs.get(id)
    }

    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }

    pub fn subnet_owner(&self, subnet_id: &Id) -> Option<&OutputOwners> {
        self.subnet_owners.get(subnet_id)
    }

    /// Sum of unlocked outputs whose threshold `addrs` can satisfy alone
    pub fn balance(&self, addrs: &[ShortId]) -> u64 {
        self.utxos
            .values()
            .filter(|u| spendable_by(&u.output.owners, addrs))
            .map(|u| u.output.amount)
            .sum()
    }

    /// Apply an accepted transaction: drop consumed UTXOs and add the
    /// change outputs that `addrs` can spend.
    pub fn accept_tx(&mut self, tx_id: Id, tx: &Tx, addrs: &[ShortId]) {
        let base = tx.unsigned.base();
        for input in &base.inputs {
            self.utxos.remove(&input.utxo_id);
        }
        for (index, output) in base.outputs.iter().enumerate() {
            if spendable_by(&output.owners, addrs) {
                self.add_utxo(Utxo {
                    utxo_id: UtxoId {
                        tx_id,
                        output_index: index as u32,
                    },
                    output: output.clone(),
                });
            }
        }
        match &tx.unsigned {
            UnsignedTx::CreateSubnet(create) => {
                self.subnet_owners.insert(tx_id, create.owner.clone());
            }
            UnsignedTx::TransferSubnetOwnership(transfer) => {
                self.subnet_owners
                    .insert(transfer.subnet_id, transfer.owner.clone());
            }
            _ => {}
        }
        self.txs.insert(tx_id, tx.clone());
    }
}

/// Whether `addrs` alone can satisfy `owners`
pub fn spendable_by(owners: &OutputOwners, addrs: &[ShortId]) -> bool {
    if owners.locktime != 0 || owners.threshold == 0 {
        return false;
    }
    let held = owners.addrs.iter().filter(|a| addrs.contains(a)).count();
    held >= owners.threshold as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::content_id;
    use crate::core::{BaseTx, CreateSubnetTx, TransferableInput, TransferableOutput};

    fn utxo(seed: &[u8], amount: u64, owner: ShortId) -> Utxo {
        Utxo {
            utxo_id: UtxoId {
                tx_id: content_id(seed),
                output_index: 0,
            },
            output: TransferableOutput {
                asset_id: content_id(b"AVAX"),
                amount,
                owners: OutputOwners::new(1, vec![owner]),
            },
        }
    }

    #[test]
    fn test_balance_counts_spendable_only() {
        let me = ShortId::from_slice(&[1; 20]);
        let other = ShortId::from_slice(&[2; 20]);
        let mut locked = utxo(b"locked", 50, me.clone());
        locked.output.owners.locktime = 10;
        let mut shared = utxo(b"shared", 70, me.clone());
        shared.output.owners = OutputOwners::new(2, vec![me.clone(), other.clone()]);

        let backend = Backend::from_utxos([
            utxo(b"a", 100, me.clone()),
            utxo(b"b", 30, other.clone()),
            locked,
            shared,
        ]);
        assert_eq!(backend.balance(&[me.clone()]), 100);
        assert_eq!(backend.balance(&[me, other]), 200);
    }

    #[test]
    fn test_accept_tx_moves_funds() {
        let me = ShortId::from_slice(&[1; 20]);
        let funding = utxo(b"funding", 1_000, me.clone());
        let mut backend = Backend::from_utxos([funding.clone()]);

        let owner = OutputOwners::new(1, vec![me.clone()]);
        let tx = Tx::new(UnsignedTx::CreateSubnet(CreateSubnetTx {
            base: BaseTx {
                inputs: vec![TransferableInput {
                    utxo_id: funding.utxo_id,
                    asset_id: funding.output.asset_id,
                    amount: 1_000,
                    sig_indices: vec![0],
                }],
                outputs: vec![TransferableOutput {
                    asset_id: funding.output.asset_id,
                    amount: 900,
                    owners: owner.clone(),
                }],
                ..Default::default()
            },
            owner: owner.clone(),
        }));
        let tx_id = tx.id();
        backend.accept_tx(tx_id, &tx, &[me.clone()]);

        assert_eq!(backend.balance(&[me]), 900);
        assert!(backend.utxo(&funding.utxo_id).is_none());
        assert_eq!(backend.subnet_owner(&tx_id), Some(&owner));
        assert!(backend.tx(&tx_id).is_some());
    }
}
