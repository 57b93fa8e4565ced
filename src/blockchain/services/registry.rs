// src/blockchain/services/registry.rs
//
// Well-known token and protocol contracts on Ethereum mainnet, looked up by name.

use crate::blockchain::error::{Error, Result};

/// Minimum normalized similarity for a fuzzy name match.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

/// Shortest name allowed to match a key by its segments.
pub const MIN_SEGMENT_QUERY_LEN: usize = 3;

// Keys are lowercase with '_' separators.
const KNOWN_CONTRACTS: &[(&str, &str)] = &[
    // tokens
    ("steth", "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84"),
    ("usdc", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    ("dai", "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
    ("usdt", "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
    ("weth", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
    // protocols
    ("uniswap_v2_router", "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
    ("aave", "0x7D2768de32b0b80B7A3454C06BDAcb11eBbEAfb5"),
    ("compound", "0x3d9819210A31b4961b30EF54bE2aeD79B9c9Cd3B"),
    ("lido", "0xae7ab96520DE3A18E5e111B5EaAb095312D7fE84"),
];

fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == *cb { 0 } else { 1 };
            current[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1);
        }
        prev = current;
    }
    prev[b.len()]
}

/// `1 - distance / longer_length`, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

// Every segment of the query is a whole `_` segment of the key.
fn matches_segments(key: &str, normalized: &str) -> bool {
    if normalized.len() < MIN_SEGMENT_QUERY_LEN {
        return false;
    }
    let key_segments: Vec<&str> = key.split('_').collect();
    normalized.split('_').all(|part| key_segments.contains(&part))
}

/// Resolves a token or protocol name to its contract address.
///
/// Matching order: exact key, key whose `_` segments include every word of the
/// name, then the most similar key scoring at least [`SIMILARITY_THRESHOLD`].
pub fn lookup_contract_address(name: &str) -> Result<&'static str> {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return Err(Error::Validation("contract name must not be empty".to_string()));
    }

    if let Some((_, address)) = KNOWN_CONTRACTS.iter().find(|(key, _)| *key == normalized) {
        return Ok(*address);
    }

    if let Some((_, address)) = KNOWN_CONTRACTS.iter().find(|(key, _)| matches_segments(key, &normalized)) {
        return Ok(*address);
    }

    KNOWN_CONTRACTS
        .iter()
        .map(|(key, address)| (similarity(&normalized, key), *address))
        .filter(|(score, _)| *score >= SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, address)| address)
        .ok_or_else(|| Error::NotFound(format!("Contract address not found for name: {}", name)))
}
