// src/blockchain/services/simulation.rs
//
// Bundle simulation through the Tenderly node gateway and normalization of its
// per-transaction traces into `SimulationResult`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::blockchain::{
    error::{Error, Result},
    models::{AssetChange, SimulationResult, TransactionParams, TransactionResult},
};

const PROVIDER: &str = "tenderly";

/// Recorded for a failed transaction whose trace carries no error message.
pub const FAILED_WITHOUT_MESSAGE: &str = "transaction failed without an error message";

/// Multi-transaction simulation against one virtual chain state.
#[async_trait]
pub trait SimulationProvider: Send + Sync {
    /// One raw result per submitted transaction, in submission order.
    async fn simulate_bundle(&self, transactions: &[TransactionParams]) -> Result<Vec<RawTransactionResult>>;
}

// --- Provider response shapes ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionResult {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub trace: Option<Vec<CallFrame>>,
    #[serde(default)]
    pub asset_changes: Option<Vec<RawAssetChange>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssetChange {
    #[serde(rename = "type", default)]
    pub change_type: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    pub raw_amount: String,
    #[serde(default)]
    pub asset_info: RawAssetInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAssetInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub contract_address: Option<String>,
}

impl From<RawAssetChange> for AssetChange {
    fn from(raw: RawAssetChange) -> Self {
        AssetChange {
            asset_type: raw.change_type,
            name: raw.asset_info.name,
            symbol: raw.asset_info.symbol,
            decimals: raw.asset_info.decimals,
            raw_amount: raw.raw_amount,
            sender: raw.from.unwrap_or_default(),
            receiver: raw.to.unwrap_or_default(),
            contract_address: raw.asset_info.contract_address.filter(|a| !a.is_empty()),
        }
    }
}

// --- Tenderly gateway client ---

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct BundleResponse {
    #[serde(default)]
    result: Option<Vec<RawTransactionResult>>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// `tenderly_simulateBundle` over the Tenderly node gateway.
#[derive(Clone)]
pub struct TenderlyClient {
    client: Client,
    gateway_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl TenderlyClient {
    pub fn new(gateway_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::remote(PROVIDER, format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.gateway_url, self.api_key.expose_secret())
    }
}

pub fn bundle_request(transactions: &[TransactionParams]) -> Value {
    let txs: Vec<Value> = transactions
        .iter()
        .map(|tx| {
            json!({
                "from": tx.from_address,
                "to": tx.to_address,
                "data": tx.data,
                "value": tx.value,
            })
        })
        .collect();
    json!({
        "id": 0,
        "jsonrpc": "2.0",
        "method": "tenderly_simulateBundle",
        "params": [txs, "latest"],
    })
}

#[async_trait]
impl SimulationProvider for TenderlyClient {
    async fn simulate_bundle(&self, transactions: &[TransactionParams]) -> Result<Vec<RawTransactionResult>> {
        info!("Simulating bundle of {} transactions", transactions.len());
        let res = self
            .client
            .post(self.endpoint())
            .json(&bundle_request(transactions))
            .send()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;
        let parsed = serde_json::from_str::<BundleResponse>(&body);

        if !status.is_success() {
            let message = match parsed {
                Ok(BundleResponse { error: Some(err), .. }) if !err.message.is_empty() => err.message,
                _ => body,
            };
            return Err(Error::remote(
                PROVIDER,
                format!("HTTP {}: {}", status.as_u16(), message),
            ));
        }

        let parsed = parsed.map_err(|e| Error::remote(PROVIDER, format!("malformed response: {}", e)))?;
        if let Some(err) = parsed.error {
            return Err(Error::remote(PROVIDER, format!("Simulation API error: {}", err.message)));
        }
        parsed
            .result
            .ok_or_else(|| Error::remote(PROVIDER, format!("Unexpected response: {}", body)))
    }
}

// --- Formatting ---

fn first_call(trace: &[CallFrame]) -> Option<(String, String)> {
    trace.first().map(|frame| {
        (
            frame.from.clone().unwrap_or_default(),
            frame.to.clone().unwrap_or_default(),
        )
    })
}

/// Message of the innermost failing frame: the last frame with a non-empty `error`.
pub fn extract_error_from_trace(trace: &[CallFrame]) -> Option<String> {
    trace.iter().rev().find_map(|frame| {
        let error = frame.error.as_deref().filter(|e| !e.is_empty())?;
        Some(match frame.error_reason.as_deref().filter(|r| !r.is_empty()) {
            Some(reason) => format!("{}: {}", error, reason),
            None => error.to_string(),
        })
    })
}

/// Normalizes one raw result per submitted transaction into a [`SimulationResult`].
///
/// Sender and recipient come from the outermost call frame, or from the submitted
/// transaction when the provider returned no trace.
pub fn format_simulation_result(
    submitted: &[TransactionParams],
    results: Vec<RawTransactionResult>,
) -> Result<SimulationResult> {
    if results.is_empty() {
        return Err(Error::remote(PROVIDER, "No results from simulation"));
    }
    if results.len() != submitted.len() {
        return Err(Error::remote(
            PROVIDER,
            format!(
                "expected {} results, got {}",
                submitted.len(),
                results.len()
            ),
        ));
    }

    let sender = submitted
        .first()
        .map(|tx| tx.from_address.clone())
        .unwrap_or_default();

    let tx_results = submitted
        .iter()
        .zip(results)
        .enumerate()
        .map(|(i, (tx, result))| {
            let trace = result.trace.unwrap_or_default();
            let (from, to) = first_call(&trace)
                .unwrap_or_else(|| (tx.from_address.clone(), tx.to_address.clone()));

            if !result.status {
                let error = extract_error_from_trace(&trace).unwrap_or_else(|| {
                    warn!("Transaction #{} failed without an error in its trace", i + 1);
                    FAILED_WITHOUT_MESSAGE.to_string()
                });
                debug!("Transaction #{} failed: {}", i + 1, error);
                return TransactionResult::failed(from, to, error);
            }

            let asset_changes = result
                .asset_changes
                .unwrap_or_default()
                .into_iter()
                .map(AssetChange::from)
                .collect();
            TransactionResult::succeeded(from, to, asset_changes)
        })
        .collect();

    SimulationResult::new(sender, tx_results)
}

/// Submits bundles and formats their outcome.
#[derive(Clone)]
pub struct Simulator {
    provider: Arc<dyn SimulationProvider>,
}

impl Simulator {
    pub fn new(provider: Arc<dyn SimulationProvider>) -> Self {
        Self { provider }
    }

    /// Simulates `transactions` in order as one atomic bundle.
    ///
    /// Either every transaction gets a result (succeeded or failed) or the whole
    /// call fails.
    pub async fn simulate_transaction_bundle(
        &self,
        transactions: &[TransactionParams],
    ) -> Result<SimulationResult> {
        if transactions.is_empty() {
            return Err(Error::Validation("transaction bundle must not be empty".to_string()));
        }
        for tx in transactions {
            tx.check()?;
        }
        let results = self.provider.simulate_bundle(transactions).await?;
        format_simulation_result(transactions, results)
    }
}
