//! Node clients
//!
//! The [`PlatformClient`] and [`Connector`] traits are the seams every
//! network-facing component is written against; [`HttpConnector`] is the
//! JSON-RPC implementation used by the CLI.

pub mod jsonrpc;
pub mod platform;

pub use jsonrpc::{HttpConnector, HttpPlatformClient};
pub use platform::{ClientError, Connector, PlatformClient, SubnetInfo, TxStatus};
