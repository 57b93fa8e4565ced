// src/blockchain/services/token.rs

use std::str::FromStr;

use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::BigDecimal;
use ethers_core::abi::{decode, encode, ParamType, Token};
use ethers_core::types::{Bytes, U256};
use ethers_core::utils::keccak256;
use serde_json::Value;

use crate::blockchain::error::{Error, Result};

// --- Call data helpers ---

pub fn selector(sig: &str) -> [u8; 4] {
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&keccak256(sig.as_bytes())[0..4]);
    sel
}

pub fn encode_call(sig: &str, tokens: Vec<Token>) -> Bytes {
    let mut out = selector(sig).to_vec();
    let mut tail = encode(&tokens);
    out.append(&mut tail);
    Bytes::from(out)
}

pub fn hex_to_bytes(v: &Value) -> Result<Vec<u8>> {
    let s = v
        .as_str()
        .ok_or_else(|| Error::remote("rpc", "eth_call result not string"))?;
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| Error::remote("rpc", format!("invalid hex in eth_call result: {}", e)))
}

pub fn decode_string(v: &Value) -> Option<String> {
    // Try standard ABI string
    if let Ok(bytes) = hex_to_bytes(v) {
        if let Ok(tokens) = decode(&[ParamType::String], &bytes) {
            if let Some(Token::String(s)) = tokens.first() {
                return Some(s.clone());
            }
        }
        // Fallback: bytes32 to string (strip zeros)
        if let Ok(tokens) = decode(&[ParamType::FixedBytes(32)], &bytes) {
            if let Some(Token::FixedBytes(b)) = tokens.first() {
                let s = String::from_utf8(b.iter().copied().take_while(|c| *c != 0u8).collect()).ok();
                if s.is_some() {
                    return s;
                }
            }
        }
    }
    None
}

pub fn decode_u256(v: &Value) -> Option<U256> {
    let bytes = hex_to_bytes(v).ok()?;
    match decode(&[ParamType::Uint(256)], &bytes).ok()?.first() {
        Some(Token::Uint(n)) => Some(*n),
        _ => None,
    }
}

pub fn decode_address(v: &Value) -> Option<String> {
    let bytes = hex_to_bytes(v).ok()?;
    match decode(&[ParamType::Address], &bytes).ok()?.first() {
        Some(Token::Address(a)) => Some(format!("{:?}", a)),
        _ => None,
    }
}

// --- Amount conversion ---

fn parse_hex_amount(raw_amount: &str) -> Result<BigInt> {
    let digits = raw_amount
        .strip_prefix("0x")
        .or_else(|| raw_amount.strip_prefix("0X"))
        .ok_or_else(|| Error::Validation(format!("raw amount must be 0x-prefixed hex: {}", raw_amount)))?;
    BigInt::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| Error::Validation(format!("raw amount is not valid hex: {}", raw_amount)))
}

/// Largest `decimals` accepted, the range of ERC-20 `decimals()`.
pub const MAX_DECIMALS: u32 = u8::MAX as u32;

fn check_decimals(decimals: u32) -> Result<()> {
    if decimals > MAX_DECIMALS {
        return Err(Error::Validation(format!(
            "decimals must be at most {}, got {}",
            MAX_DECIMALS, decimals
        )));
    }
    Ok(())
}

/// Converts a hex smallest-unit amount to `raw / 10^decimals` exactly.
pub fn raw_to_decimal(raw_amount: &str, decimals: u32) -> Result<BigDecimal> {
    check_decimals(decimals)?;
    Ok(BigDecimal::new(parse_hex_amount(raw_amount)?, i64::from(decimals)))
}

/// Converts a human-readable decimal amount to its smallest unit.
///
/// Rejects negative amounts and amounts with more fractional digits than `decimals`.
pub fn to_smallest_unit(amount: &str, decimals: u32) -> Result<BigInt> {
    check_decimals(decimals)?;
    let parsed = BigDecimal::from_str(amount.trim())
        .map_err(|e| Error::Validation(format!("invalid amount '{}': {}", amount, e)))?;
    let scaled = (parsed * BigDecimal::new(BigInt::from(1), -i64::from(decimals))).normalized();
    let (digits, scale) = scaled.as_bigint_and_exponent();
    if digits.sign() == Sign::Minus {
        return Err(Error::Validation("amount must not be negative".to_string()));
    }
    if scale > 0 {
        return Err(Error::Validation(format!(
            "amount has more than {} fractional digits",
            decimals
        )));
    }
    let exponent = scale.unsigned_abs();
    if exponent > u64::from(2 * MAX_DECIMALS) {
        return Err(Error::Validation(format!("amount '{}' is too large", amount)));
    }
    Ok(digits * BigInt::from(10).pow(exponent as u32))
}

/// Plain positional rendering with trailing fractional zeros removed.
pub fn format_plain(value: &BigDecimal) -> String {
    let (digits, scale) = value.as_bigint_and_exponent();
    let mut s = digits.magnitude().to_string();
    if s == "0" {
        return s;
    }
    if scale <= 0 {
        s.push_str(&"0".repeat(scale.unsigned_abs() as usize));
    } else {
        let scale = scale as usize;
        if s.len() <= scale {
            s = format!("{}{}", "0".repeat(scale - s.len() + 1), s);
        }
        s.insert(s.len() - scale, '.');
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if digits.sign() == Sign::Minus {
        s.insert(0, '-');
    }
    s
}

pub fn dec_to_hex(value: &str) -> Result<String> {
    let n = U256::from_dec_str(value.trim())
        .map_err(|e| Error::Validation(format!("invalid decimal integer '{}': {}", value, e)))?;
    Ok(format!("0x{:x}", n))
}
