use serde::Serialize;

/// Static metadata for one supported EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub chain_id: &'static str,
    /// Lowercase name accepted as a network identifier
    pub name: &'static str,
    pub display_name: &'static str,
    pub native_symbol: &'static str,
    /// Value sent as the `network` query parameter
    pub network_param: &'static str,
}

pub const SUPPORTED_CHAINS: [ChainInfo; 7] = [
    ChainInfo {
        chain_id: "1",
        name: "ethereum",
        display_name: "Ethereum",
        native_symbol: "ETH",
        network_param: "mainnet",
    },
    ChainInfo {
        chain_id: "137",
        name: "polygon",
        display_name: "Polygon",
        native_symbol: "MATIC",
        network_param: "polygon",
    },
    ChainInfo {
        chain_id: "8453",
        name: "base",
        display_name: "Base",
        native_symbol: "ETH",
        network_param: "base",
    },
    ChainInfo {
        chain_id: "42161",
        name: "arbitrum",
        display_name: "Arbitrum",
        native_symbol: "ETH",
        network_param: "arbitrum-one",
    },
    ChainInfo {
        chain_id: "10",
        name: "optimism",
        display_name: "Optimism",
        native_symbol: "ETH",
        network_param: "optimism",
    },
    ChainInfo {
        chain_id: "56",
        name: "bsc",
        display_name: "BSC",
        native_symbol: "BNB",
        network_param: "bsc",
    },
    ChainInfo {
        chain_id: "43114",
        name: "avalanche",
        display_name: "Avalanche",
        native_symbol: "AVAX",
        network_param: "avalanche",
    },
];

/// Look up a chain by numeric id ("137") or name ("Polygon", case-insensitive).
pub fn resolve(network: &str) -> Option<&'static ChainInfo> {
    let wanted = network.trim();
    SUPPORTED_CHAINS
        .iter()
        .find(|chain| chain.chain_id == wanted || chain.name.eq_ignore_ascii_case(wanted))
}

/// Canonical names of every supported network, in registry order.
pub fn supported_networks() -> impl Iterator<Item = &'static str> {
    SUPPORTED_CHAINS.iter().map(|chain| chain.name)
}
