//! Target networks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MAINNET_ID: u32 = 1;
pub const TESTNET_ID: u32 = 5;
pub const LOCAL_ID: u32 = 1337;

/// Bech32 HRP avalanchego uses for addresses on `network_id`
pub fn hrp_for_network_id(network_id: u32) -> &'static str {
    match network_id {
        MAINNET_ID => "avax",
        TESTNET_ID => "fuji",
        12345 => "local",
        _ => "custom",
    }
}

/// Network a transaction is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    Local,
    Testnet,
    Mainnet,
}

impl Network {
    pub fn network_id(&self) -> u32 {
        match self {
            Network::Local => LOCAL_ID,
            Network::Testnet => TESTNET_ID,
            Network::Mainnet => MAINNET_ID,
        }
    }

    pub fn from_network_id(id: u32) -> Option<Self> {
        match id {
            LOCAL_ID => Some(Network::Local),
            TESTNET_ID => Some(Network::Testnet),
            MAINNET_ID => Some(Network::Mainnet),
            _ => None,
        }
    }

    pub fn hrp(&self) -> &'static str {
        hrp_for_network_id(self.network_id())
    }

    /// Key used for this network in sidecar files
    pub fn name(&self) -> &'static str {
        match self {
            Network::Local => "Local Network",
            Network::Testnet => "Fuji",
            Network::Mainnet => "Mainnet",
        }
    }

    /// Value accepted on the command line
    pub fn flag(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Network::Local),
            "testnet" | "fuji" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(format!("unknown network {:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_ids() {
        for network in [Network::Local, Network::Testnet, Network::Mainnet] {
            assert_eq!(Network::from_network_id(network.network_id()), Some(network));
            assert_eq!(network.flag().parse::<Network>().unwrap(), network);
        }
        assert_eq!(Network::from_network_id(42), None);
        assert_eq!("fuji".parse::<Network>().unwrap(), Network::Testnet);
    }

    #[test]
    fn test_hrp() {
        assert_eq!(Network::Mainnet.hrp(), "avax");
        assert_eq!(Network::Testnet.hrp(), "fuji");
        assert_eq!(Network::Local.hrp(), "custom");
        assert_eq!(hrp_for_network_id(12345), "local");
    }
}
