//! EVM network identifiers.

use serde::{Deserialize, Serialize};

/// Networks the monitor recognises when it logs `eth_chainId` at startup.
const KNOWN: &[(u64, Chain)] = &[
    (1, Chain::Ethereum),
    (10, Chain::Optimism),
    (56, Chain::Bsc),
    (100, Chain::Gnosis),
    (137, Chain::Polygon),
    (8453, Chain::Base),
    (42161, Chain::Arbitrum),
    (80002, Chain::PolygonAmoy),
    (11155111, Chain::Sepolia),
];

/// EVM network, keyed by its `eth_chainId` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Ethereum,
    Optimism,
    Bsc,
    Gnosis,
    Polygon,
    Base,
    Arbitrum,
    PolygonAmoy,
    Sepolia,
}

impl Chain {
    /// Resolve a chain from the id returned by `eth_chainId`.
    pub fn from_chain_id(id: u64) -> Option<Self> {
        KNOWN.iter().find(|(known, _)| *known == id).map(|(_, chain)| *chain)
    }

    /// Network slug as used by explorers and RPC providers.
    pub fn network(self) -> &'static str {
        match self {
            Chain::Ethereum => "mainnet",
            Chain::Optimism => "optimism",
            Chain::Bsc => "bsc",
            Chain::Gnosis => "gnosis",
            Chain::Polygon => "polygon",
            Chain::Base => "base",
            Chain::Arbitrum => "arbitrum-one",
            Chain::PolygonAmoy => "polygon-amoy",
            Chain::Sepolia => "sepolia",
        }
    }

    /// Symbol of the gas token.
    pub fn native_symbol(self) -> &'static str {
        match self {
            Chain::Bsc => "BNB",
            Chain::Gnosis => "xDAI",
            Chain::Polygon | Chain::PolygonAmoy => "POL",
            _ => "ETH",
        }
    }

    pub fn is_testnet(self) -> bool {
        matches!(self, Chain::PolygonAmoy | Chain::Sepolia)
    }

    /// Label for a raw chain id, e.g. `137 (polygon, POL)`.
    pub fn describe(id: u64) -> String {
        match Self::from_chain_id(id) {
            Some(chain) if chain.is_testnet() => {
                format!("{} ({} testnet, {})", id, chain.network(), chain.native_symbol())
            }
            Some(chain) => format!("{} ({}, {})", id, chain.network(), chain.native_symbol()),
            None => format!("{} (unknown network)", id),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.network())
    }
}
