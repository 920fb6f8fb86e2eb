use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const ANVIL_CHAIN_ID: u64 = 31337;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const MAINNET_CHAIN_ID: u64 = 1;
pub const ARBITRUM_SEPOLIA_CHAIN_ID: u64 = 421614;
pub const AMOY_CHAIN_ID: u64 = 80002;

pub const UNSUPPORTED_NETWORK_LABEL: &str = "unsupported";

/// Networks the deployment console knows how to label. The label is the key
/// the metadata backend files deployments under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Anvil,
    Sepolia,
    Ethereum,
    ArbitrumSepolia,
    Amoy,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown network label: {0}")]
pub struct UnknownNetwork(pub String);

impl Network {
    pub const ALL: [Network; 5] = [
        Network::Anvil,
        Network::Sepolia,
        Network::Ethereum,
        Network::ArbitrumSepolia,
        Network::Amoy,
    ];

    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Anvil => ANVIL_CHAIN_ID,
            Network::Sepolia => SEPOLIA_CHAIN_ID,
            Network::Ethereum => MAINNET_CHAIN_ID,
            Network::ArbitrumSepolia => ARBITRUM_SEPOLIA_CHAIN_ID,
            Network::Amoy => AMOY_CHAIN_ID,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        Self::ALL
            .into_iter()
            .find(|network| network.chain_id() == chain_id)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Network::Anvil => "anvil",
            Network::Sepolia => "sepolia",
            Network::Ethereum => "ethereum",
            Network::ArbitrumSepolia => "arbitrum_sepolia",
            Network::Amoy => "amoy",
        }
    }

    pub fn is_test_network(&self) -> bool {
        !matches!(self, Network::Ethereum)
    }

    /// Only the local development node accepts `evm_mine` / `evm_setAutomine`.
    pub fn is_dev_chain(&self) -> bool {
        matches!(self, Network::Anvil)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "anvil" | "local" | "localhost" => Ok(Network::Anvil),
            "sepolia" => Ok(Network::Sepolia),
            "ethereum" | "mainnet" => Ok(Network::Ethereum),
            "arbitrum_sepolia" => Ok(Network::ArbitrumSepolia),
            "amoy" => Ok(Network::Amoy),
            _ => Err(UnknownNetwork(value.to_string())),
        }
    }
}

pub fn network_label(chain_id: u64) -> &'static str {
    Network::from_chain_id(chain_id)
        .map(|network| network.label())
        .unwrap_or(UNSUPPORTED_NETWORK_LABEL)
}
