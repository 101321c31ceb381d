//! Signer-set computation
//!
//! The required signers of a transaction are the control keys its subnet
//! authorization points at; the remaining signers are those whose slot in
//! the subnet auth credential is still empty. Both are derived from the
//! transaction's current credentials on every call and never cached.

use super::coordinator::MultisigError;
use crate::core::{ShortId, Tx};
use crate::crypto::recover_short_id;

/// Required and outstanding signers of one transaction, in signer-index order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignerSet {
    required: Vec<ShortId>,
    remaining: Vec<ShortId>,
}

impl SignerSet {
    pub fn required(&self) -> &[ShortId] {
        &self.required
    }

    pub fn remaining(&self) -> &[ShortId] {
        &self.remaining
    }

    /// Required signers whose signature is present
    pub fn signed(&self) -> Vec<ShortId> {
        self.required
            .iter()
            .filter(|a| !self.remaining.contains(a))
            .cloned()
            .collect()
    }

    pub fn signed_count(&self) -> usize {
        self.required.len() - self.remaining.len()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

/// Compute the signer set of `tx` against the subnet's `control_keys`.
///
/// Kinds without a subnet authorization have no required signers and are
/// always ready to commit. Otherwise every funding credential must already
/// be complete, the subnet auth credential must have one slot per required
/// signer, and every filled slot must carry that signer's signature.
pub fn remaining_signers(tx: &Tx, control_keys: &[ShortId]) -> Result<SignerSet, MultisigError> {
    let Some(auth) = tx.unsigned.subnet_auth() else {
        return Ok(SignerSet::default());
    };
    auth.validate()?;

    let mut required = Vec::with_capacity(auth.sig_indices.len());
    for index in &auth.sig_indices {
        let key = control_keys.get(*index as usize).ok_or(
            MultisigError::SignerIndexOutOfRange {
                index: *index,
                count: control_keys.len(),
            },
        )?;
        required.push(key.clone());
    }

    let expected_creds = tx.unsigned.base().inputs.len() + 1;
    if tx.creds.len() != expected_creds {
        return Err(MultisigError::CredentialMismatch {
            expected: expected_creds,
            found: tx.creds.len(),
        });
    }
    let (auth_cred, funding) = tx
        .creds
        .split_last()
        .ok_or(MultisigError::CredentialMismatch {
            expected: expected_creds,
            found: 0,
        })?;
    if let Some(index) = funding.iter().position(|c| !c.is_complete()) {
        return Err(MultisigError::UnsignedFundingCredential(index));
    }
    if auth_cred.sigs.len() != required.len() {
        return Err(MultisigError::AuthSignatureCountMismatch {
            expected: required.len(),
            found: auth_cred.sigs.len(),
        });
    }

    let digest = tx.unsigned.signing_digest();
    let mut remaining = Vec::new();
    for (slot, (sig, signer)) in auth_cred.sigs.iter().zip(&required).enumerate() {
        if sig.is_empty() {
            remaining.push(signer.clone());
            continue;
        }
        if recover_short_id(&digest, sig.as_bytes())? != *signer {
            return Err(MultisigError::ForeignSignature {
                slot,
                expected: signer.clone(),
            });
        }
    }

    Ok(SignerSet {
        required,
        remaining,
    })
}
