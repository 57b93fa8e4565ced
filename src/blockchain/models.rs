// src/blockchain/models.rs
use std::fmt;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use crate::blockchain::{
    error::{Error, Result},
    services::token::{format_plain, raw_to_decimal},
};

// --- ABI Models ---

/// One element of a contract's JSON ABI.
///
/// Fields the resolver does not inspect (`constant`, `payable`, `anonymous`, ...)
/// are kept in `extra` so the entry serializes back to what the explorer sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    #[serde(
        rename = "stateMutability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub state_mutability: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// The ABI JSON format treats a missing `type` as a function.
fn default_entry_type() -> String {
    "function".to_string()
}

impl AbiEntry {
    pub fn is_function_named(&self, function_name: &str) -> bool {
        self.entry_type == "function" && self.name.as_deref() == Some(function_name)
    }
}

// --- Transaction Models ---

fn validate_hex_prefix(value: &str) -> std::result::Result<(), ValidationError> {
    if value.starts_with("0x") {
        Ok(())
    } else {
        Err(ValidationError::new("must start with '0x'"))
    }
}

fn default_data() -> String {
    "0x".to_string()
}

fn default_value() -> String {
    "0x0".to_string()
}

/// Parameters of one transaction submitted for simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TransactionParams {
    /// Sender address, `0x` followed by 40 hex characters
    #[serde(alias = "from")]
    #[validate(length(equal = 42), custom = "validate_hex_prefix")]
    pub from_address: String,
    /// Recipient or contract address
    #[serde(alias = "to")]
    #[validate(length(equal = 42), custom = "validate_hex_prefix")]
    pub to_address: String,
    /// Call data in hex
    #[serde(default = "default_data")]
    #[validate(custom = "validate_hex_prefix")]
    pub data: String,
    /// Native currency amount in hex
    #[serde(default = "default_value")]
    #[validate(custom = "validate_hex_prefix")]
    pub value: String,
}

impl TransactionParams {
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        data: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self> {
        let params = Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            data: data.into(),
            value: value.into(),
        };
        params.check()?;
        Ok(params)
    }

    /// Runs the format checks, for params that arrived through deserialization.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::Validation(format!("invalid transaction params: {}", e)))
    }
}

impl fmt::Display for TransactionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "From: {}\nTo: {}\nData: {}\nValue: {}",
            self.from_address, self.to_address, self.data, self.value
        )
    }
}

// --- Simulation Models ---

/// A token or native-currency movement recorded during a simulated transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetChange {
    #[serde(rename = "type")]
    pub asset_type: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    /// Smallest-unit amount exactly as the provider reported it (hex)
    pub raw_amount: String,
    pub sender: String,
    pub receiver: String,
    /// `None` for the chain's native currency
    pub contract_address: Option<String>,
}

/// How an asset change relates to the account that sent the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Neither side is the account, e.g. a mint with no sender.
    Unrelated,
}

impl Direction {
    pub fn sign(&self) -> &'static str {
        match self {
            Direction::Outgoing => "-",
            Direction::Incoming => "+",
            Direction::Unrelated => "?",
        }
    }
}

impl AssetChange {
    pub fn is_native(&self) -> bool {
        self.contract_address.is_none()
    }

    pub fn direction(&self, account: &str) -> Result<Direction> {
        let is_sender = self.sender.eq_ignore_ascii_case(account);
        let is_receiver = self.receiver.eq_ignore_ascii_case(account);
        match (is_sender, is_receiver) {
            (true, true) => Err(Error::Validation(format!(
                "asset change of {} has {} as both sender and receiver",
                self.symbol, account
            ))),
            (true, false) => Ok(Direction::Outgoing),
            (false, true) => Ok(Direction::Incoming),
            (false, false) => Ok(Direction::Unrelated),
        }
    }

    /// `raw_amount / 10^decimals`, computed without floating point.
    pub fn amount(&self) -> Result<BigDecimal> {
        raw_to_decimal(&self.raw_amount, self.decimals)
    }

    pub fn delta(&self, account: &str) -> Result<AssetDelta> {
        Ok(AssetDelta {
            symbol: self.symbol.to_uppercase(),
            asset: self
                .contract_address
                .clone()
                .unwrap_or_else(|| "Native".to_string()),
            direction: self.direction(account)?,
            amount: self.amount()?,
            raw_amount: self.raw_amount.clone(),
        })
    }
}

/// Display form of an [`AssetChange`] seen from one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDelta {
    pub symbol: String,
    pub asset: String,
    pub direction: Direction,
    pub amount: BigDecimal,
    pub raw_amount: String,
}

impl fmt::Display for AssetDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}{} ({})",
            self.symbol,
            self.asset,
            self.direction.sign(),
            format_plain(&self.amount),
            self.raw_amount
        )?;
        if self.direction == Direction::Unrelated {
            write!(f, " [not sent or received by this account]")?;
        }
        Ok(())
    }
}

/// Outcome of one transaction inside a simulated bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionResult {
    from_address: String,
    to_address: String,
    asset_changes: Vec<AssetChange>,
    error: String,
}

impl TransactionResult {
    /// A failed transaction carries its error and no asset changes.
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        asset_changes: Vec<AssetChange>,
        error: impl Into<String>,
    ) -> Result<Self> {
        let error = error.into();
        if !error.is_empty() && !asset_changes.is_empty() {
            return Err(Error::Validation(format!(
                "failed transaction cannot carry asset changes: {}",
                error
            )));
        }
        Ok(Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            asset_changes,
            error,
        })
    }

    pub fn succeeded(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        asset_changes: Vec<AssetChange>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            asset_changes,
            error: String::new(),
        }
    }

    pub fn failed(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            asset_changes: Vec::new(),
            error: error.into(),
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn to_address(&self) -> &str {
        &self.to_address
    }

    pub fn asset_changes(&self) -> &[AssetChange] {
        &self.asset_changes
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Signed deltas relative to this transaction's sender, in record order.
    pub fn deltas(&self) -> Result<Vec<AssetDelta>> {
        self.asset_changes
            .iter()
            .map(|change| change.delta(&self.from_address))
            .collect()
    }

    /// Human-readable summary. Fails if any asset change cannot be signed.
    pub fn render(&self) -> Result<String> {
        let status = if self.is_success() {
            "successful"
        } else {
            "failed"
        };
        let mut lines = vec![format!("Transaction was {}.", status)];
        if !self.error.is_empty() {
            lines.push(self.error.clone());
        }
        for delta in self.deltas()? {
            lines.push(delta.to_string());
        }
        Ok(lines.join("\n"))
    }
}

/// Per-transaction results of one bundle simulation, in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    from_address: String,
    tx_results: Vec<TransactionResult>,
}

impl SimulationResult {
    /// Every result must come from `from_address` (case-insensitive) when it is non-empty.
    pub fn new(from_address: impl Into<String>, tx_results: Vec<TransactionResult>) -> Result<Self> {
        let from_address = from_address.into();
        if !from_address.is_empty() {
            if let Some((index, tx)) = tx_results
                .iter()
                .enumerate()
                .find(|(_, tx)| !tx.from_address.eq_ignore_ascii_case(&from_address))
            {
                return Err(Error::Validation(format!(
                    "from address mismatch in transaction #{}: expected {}, got {}",
                    index + 1,
                    from_address.to_lowercase(),
                    tx.from_address
                )));
            }
        }
        Ok(Self {
            from_address,
            tx_results,
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn tx_results(&self) -> &[TransactionResult] {
        &self.tx_results
    }

    pub fn len(&self) -> usize {
        self.tx_results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx_results.is_empty()
    }

    /// Renders every transaction. A transaction whose asset changes cannot be
    /// signed is reported as a formatting fault without hiding the others.
    pub fn render(&self) -> String {
        self.tx_results
            .iter()
            .enumerate()
            .map(|(i, tx)| match tx.render() {
                Ok(text) => format!("#{}: {}", i + 1, text),
                Err(e) => format!("#{}: formatting fault: {}", i + 1, e),
            })
            .collect::<Vec<_>>()
            .join("\n-------------------------------------\n")
    }
}

// --- Token and Chain Models ---

/// Defines the structure for token information response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfoResponse {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub contract_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub id: u64,
    pub name: String,
}
