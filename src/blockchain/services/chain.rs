// src/blockchain/services/chain.rs

use crate::blockchain::{
    error::{Error, Result},
    models::ChainMetadata,
};

const CHAINS: &[(&str, u64, &str)] = &[
    ("arbitrum", 42161, "Arbitrum One"),
    ("base", 8453, "Base"),
    ("blast", 81457, "Blast"),
    ("bsc", 56, "Binance Smart Chain"),
    ("ethereum", 1, "Ethereum"),
    ("linea", 59144, "Linea"),
    ("optimism", 10, "Optimism"),
    ("polygon", 137, "Polygon"),
    ("scroll", 534352, "Scroll"),
];

/// Looks a chain up by its short name (`"base"`) or numeric id (`"8453"`).
pub fn get_chain_metadata(query: &str) -> Result<ChainMetadata> {
    let normalized = query.trim().to_lowercase();
    let by_id = normalized.parse::<u64>().ok();

    CHAINS
        .iter()
        .find(|(key, id, _)| *key == normalized || Some(*id) == by_id)
        .map(|(_, id, name)| ChainMetadata {
            id: *id,
            name: name.to_string(),
        })
        .ok_or_else(|| Error::NotFound(format!("Unsupported chain: {}", query)))
}
