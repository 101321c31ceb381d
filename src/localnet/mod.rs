//! Local cluster provisioning
//!
//! Everything that drives a running local cluster: the [`ClusterControl`]
//! seam and its network-runner gRPC client, node config whitelisting,
//! serialized restarts, readiness waits, the [`BootstrapSequencer`] and
//! tracking of newly deployed blockchains.

pub mod bootstrap;
pub mod cluster;
pub mod node_config;
pub mod readiness;
pub mod restart;
pub mod runner;
pub mod track;
pub mod vmid;

pub use bootstrap::{
    BootstrapError, BootstrapOptions, BootstrapReport, BootstrapSequencer, Phase, StepError,
    VmSpec, VmState,
};
pub use cluster::{ClusterControl, ClusterError, ClusterInfo, NodeInfo};
pub use node_config::{
    merge_whitelist, parse_whitelist, update_json_key, whitelist_string, whitelist_subnets,
    WHITELISTED_SUBNETS_KEY,
};
pub use readiness::{
    blockchain_log_path, wait_for_blockchains, wait_for_log_file, READINESS_POLL_INTERVAL,
};
pub use restart::{restart_nodes, wait_for_health, RestartPlan};
pub use runner::RunnerClient;
pub use track::{rpc_endpoint, track_blockchain, TrackError};
pub use vmid::{vm_id_from_name, VmIdError};
