//! Multi-signature transaction support
//!
//! Subnet-authorized transactions need signatures from a threshold of the
//! subnet's control keys. The artifact travels between signers as a file;
//! each signer adds what their wallet holds until the tx can be committed.
//!
//! # Example
//!
//! ```ignore
//! use subnet_cli::multisig::{MultisigCoordinator, TxArtifact};
//!
//! let mut artifact = TxArtifact::load(path)?;
//! let coordinator = MultisigCoordinator::new(wallet);
//!
//! // Who still has to sign?
//! let owners = coordinator.get_owners(subnet_id).await?;
//! let set = coordinator.remaining_signers(&artifact, &owners.control_keys)?;
//!
//! // Add our signatures and pass the file on
//! coordinator.sign(&mut artifact, set.remaining(), subnet_id).await?;
//! artifact.save(path)?;
//! ```

pub mod artifact;
pub mod coordinator;
pub mod deployer;
pub mod signers;

pub use artifact::TxArtifact;
pub use coordinator::{MultisigCoordinator, MultisigError, SignOutcome};
pub use deployer::{DeployOutcome, PublicDeployer};
pub use signers::{remaining_signers, SignerSet};
