// src/blockchain/services/address.rs

use std::str::FromStr;

use ethers::{types::Address, utils::to_checksum};
use serde_json::Value;

use crate::blockchain::error::{Error, Result};

fn has_address_shape(candidate: &str) -> bool {
    candidate.len() == 42
        && candidate.starts_with("0x")
        && candidate[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// True for `0x` + 40 hex characters. Mixed-case input must carry a valid checksum.
pub fn is_address(candidate: &str) -> bool {
    if !has_address_shape(candidate) {
        return false;
    }
    let body = &candidate[2..];
    let all_lower = body == body.to_ascii_lowercase();
    let all_upper = body == body.to_ascii_uppercase();
    if all_lower || all_upper {
        return true;
    }
    Address::from_str(candidate)
        .map(|addr| to_checksum(&addr, None) == candidate)
        .unwrap_or(false)
}

pub fn to_checksum_address(address: &str) -> Result<String> {
    if !is_address(address) {
        return Err(Error::Validation(format!("Invalid address: {}", address)));
    }
    let parsed = Address::from_str(address)
        .map_err(|e| Error::Validation(format!("Invalid address {}: {}", address, e)))?;
    Ok(to_checksum(&parsed, None))
}

pub fn parse_address(address: &str) -> Result<Address> {
    let checksummed = to_checksum_address(address)?;
    Address::from_str(&checksummed)
        .map_err(|e| Error::Validation(format!("Invalid address {}: {}", address, e)))
}

/// Checksums every string argument that is a valid address, descending into arrays.
/// Everything else passes through unchanged.
pub fn normalize_address_args(args: &[Value]) -> Vec<Value> {
    args.iter().map(normalize_value).collect()
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) if is_address(s) => match to_checksum_address(s) {
            Ok(checksummed) => Value::String(checksummed),
            Err(_) => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        other => other.clone(),
    }
}

/// ENS names default to the `.eth` TLD.
pub fn normalize_ens_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.contains('.') {
        name
    } else {
        format!("{}.eth", name)
    }
}
