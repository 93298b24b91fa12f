//! Harmony network definitions

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Mainnet
    Mainnet,
    /// Testnet
    Testnet,
    /// Localnet (local development)
    Localnet,
}

impl NetworkType {
    /// All known networks, in display order.
    pub const ALL: [NetworkType; 3] = [Self::Mainnet, Self::Testnet, Self::Localnet];

    /// Canonical lower-case name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Localnet => "localnet",
        }
    }

    /// Map a network name reported by a browser-extension wallet.
    ///
    /// Extensions report free-form names (`"mainnet"`, `"testnet"`, `"private"`, ...).
    /// Returns `None` for names that have no internal counterpart.
    pub fn from_extension_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Self::Mainnet),
            "testnet" | "test" => Some(Self::Testnet),
            "localnet" | "local" => Some(Self::Localnet),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension_name(s).ok_or_else(|| Error::InvalidNetwork(s.to_string()))
    }
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// EVM chain id of shard 0
    pub chain_id: u64,
    /// Default RPC endpoint
    pub rpc_url: &'static str,
    /// Block explorer base URL
    pub explorer_url: &'static str,
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "mainnet",
            chain_id: 1_666_600_000,
            rpc_url: "https://api.harmony.one",
            explorer_url: "https://explorer.harmony.one",
        }
    }

    /// Get testnet parameters
    pub const fn testnet() -> Self {
        Self {
            network_type: NetworkType::Testnet,
            name: "testnet",
            chain_id: 1_666_700_000,
            rpc_url: "https://api.s0.b.hmny.io",
            explorer_url: "https://explorer.testnet.harmony.one",
        }
    }

    /// Get localnet parameters
    pub const fn localnet() -> Self {
        Self {
            network_type: NetworkType::Localnet,
            name: "localnet",
            chain_id: 1_666_700_000,
            rpc_url: "http://localhost:9500",
            explorer_url: "http://localhost:3000",
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Localnet => Self::localnet(),
        }
    }
}
