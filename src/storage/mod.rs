//! Storage module for sidecar persistence

pub mod sidecar;

pub use sidecar::{NetworkData, Sidecar, SidecarStore, StorageError};
