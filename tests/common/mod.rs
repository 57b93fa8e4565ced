//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use evm_tx_assistant::{
    blockchain::{
        client::ChainReader,
        error::{Error, Result},
        models::{AbiEntry, TokenInfoResponse, TransactionParams},
        services::{
            explorer::BlockExplorer,
            simulation::{RawTransactionResult, SimulationProvider},
        },
    },
    config::Config,
    AppState,
};

pub const SENDER: &str = "0x2d4d2A025b10C09BDbd794B4FCe4F7ea8C7d7bB4";
pub const RECEIVER: &str = "0x8c575b178927fF9A70804B8b4F7622F7666bB360";
pub const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
pub const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";

// Digit-only addresses are their own checksum form.
pub const PROXY_1: &str = "0x1111111111111111111111111111111111111111";
pub const PROXY_2: &str = "0x2222222222222222222222222222222222222222";
pub const PROXY_3: &str = "0x3333333333333333333333333333333333333333";
pub const IMPL: &str = "0x4444444444444444444444444444444444444444";

pub fn function_entry(name: &str) -> AbiEntry {
    serde_json::from_value(json!({
        "type": "function",
        "name": name,
        "inputs": [],
        "outputs": [{"name": "", "type": "address"}],
        "stateMutability": "view"
    }))
    .unwrap()
}

/// A proxy ABI: exposes `implementation()` plus a marker function.
pub fn proxy_abi(marker: &str) -> Vec<AbiEntry> {
    vec![function_entry("implementation"), function_entry(marker)]
}

pub fn plain_abi(marker: &str) -> Vec<AbiEntry> {
    vec![function_entry(marker)]
}

pub fn has_function(abi: &[AbiEntry], name: &str) -> bool {
    abi.iter().any(|e| e.is_function_named(name))
}

#[derive(Default)]
pub struct FakeExplorer {
    pub abis: HashMap<String, Vec<AbiEntry>>,
    pub implementations: HashMap<String, String>,
    pub failures: HashMap<String, String>,
    pub delay: Option<Duration>,
    pub abi_calls: Mutex<Vec<String>>,
    pub source_calls: Mutex<Vec<String>>,
}

impl FakeExplorer {
    pub fn with_abi(mut self, address: &str, abi: Vec<AbiEntry>) -> Self {
        self.abis.insert(address.to_string(), abi);
        self
    }

    pub fn with_implementation(mut self, proxy: &str, implementation: &str) -> Self {
        self.implementations
            .insert(proxy.to_string(), implementation.to_string());
        self
    }

    pub fn with_failure(mut self, address: &str, message: &str) -> Self {
        self.failures.insert(address.to_string(), message.to_string());
        self
    }

    pub fn abi_calls(&self) -> Vec<String> {
        self.abi_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockExplorer for FakeExplorer {
    async fn contract_abi(&self, address: &str) -> Result<Vec<AbiEntry>> {
        self.abi_calls.lock().unwrap().push(address.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.failures.get(address) {
            return Err(Error::remote("etherscan", message.clone()));
        }
        self.abis
            .get(address)
            .cloned()
            .ok_or_else(|| Error::remote("etherscan", "Contract source code not verified"))
    }

    async fn implementation_address(&self, address: &str) -> Result<Option<String>> {
        self.source_calls.lock().unwrap().push(address.to_string());
        Ok(self.implementations.get(address).cloned())
    }
}

#[derive(Default)]
pub struct FakeChain {
    pub implementations: HashMap<String, String>,
    pub names: HashMap<String, String>,
    pub tokens: HashMap<String, TokenInfoResponse>,
    pub implementation_calls: Mutex<Vec<String>>,
    pub resolve_calls: Mutex<Vec<String>>,
}

impl FakeChain {
    pub fn with_implementation(mut self, proxy: &str, implementation: &str) -> Self {
        self.implementations
            .insert(proxy.to_string(), implementation.to_string());
        self
    }

    pub fn with_name(mut self, name: &str, address: &str) -> Self {
        self.names.insert(name.to_string(), address.to_string());
        self
    }

    pub fn implementation_calls(&self) -> Vec<String> {
        self.implementation_calls.lock().unwrap().clone()
    }

    pub fn resolve_calls(&self) -> Vec<String> {
        self.resolve_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn implementation_address(&self, proxy: &str) -> Result<String> {
        self.implementation_calls.lock().unwrap().push(proxy.to_string());
        self.implementations
            .get(proxy)
            .cloned()
            .ok_or_else(|| Error::remote("rpc", "execution reverted"))
    }

    async fn token_info(&self, token: &str) -> Result<TokenInfoResponse> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no token at {}", token)))
    }

    async fn resolve_name(&self, name: &str) -> Result<String> {
        self.resolve_calls.lock().unwrap().push(name.to_string());
        self.names
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("ENS name {} is not registered", name)))
    }

    async fn lookup_address(&self, address: &str) -> Result<String> {
        self.names
            .iter()
            .find(|(_, a)| a.as_str() == address)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| Error::NotFound(format!("no ENS name for {}", address)))
    }
}

/// Replays a canned gateway `result` array.
pub struct FakeSimulation {
    pub result: Value,
    pub submitted: Mutex<Vec<TransactionParams>>,
}

impl FakeSimulation {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SimulationProvider for FakeSimulation {
    async fn simulate_bundle(&self, transactions: &[TransactionParams]) -> Result<Vec<RawTransactionResult>> {
        self.submitted
            .lock()
            .unwrap()
            .extend(transactions.iter().cloned());
        serde_json::from_value(self.result.clone())
            .map_err(|e| Error::remote("tenderly", e.to_string()))
    }
}

/// Gateway `result` for the approve, swap, native-transfer bundle.
pub fn approve_swap_transfer_result() -> Value {
    json!([
        {
            "status": true,
            "trace": [{"from": SENDER.to_lowercase(), "to": USDC.to_lowercase()}],
            "assetChanges": []
        },
        {
            "status": true,
            "trace": [
                {"from": SENDER.to_lowercase(), "to": ROUTER.to_lowercase()},
                {"from": ROUTER.to_lowercase(), "to": USDC.to_lowercase()}
            ],
            "assetChanges": [
                {
                    "type": "Transfer",
                    "from": SENDER.to_lowercase(),
                    "to": "0x3041cbd36888becc7bbcbc0045e3b1f144466f5f",
                    "rawAmount": "0xf4240",
                    "assetInfo": {"name": "USD Coin", "symbol": "usdc", "decimals": 6, "contractAddress": USDC.to_lowercase()}
                },
                {
                    "type": "Transfer",
                    "from": "0x3041cbd36888becc7bbcbc0045e3b1f144466f5f",
                    "to": SENDER.to_lowercase(),
                    "rawAmount": "0xf3e5c",
                    "assetInfo": {"name": "Tether USD", "symbol": "usdt", "decimals": 6, "contractAddress": USDT.to_lowercase()}
                }
            ]
        },
        {
            "status": true,
            "trace": [{"from": SENDER.to_lowercase(), "to": RECEIVER.to_lowercase()}],
            "assetChanges": [
                {
                    "type": "Transfer",
                    "from": SENDER.to_lowercase(),
                    "to": RECEIVER.to_lowercase(),
                    "rawAmount": "0x7b",
                    "assetInfo": {"name": "Ether", "symbol": "ETH", "decimals": 18}
                }
            ]
        }
    ])
}

/// Same bundle with a direct USDC transfer from the sender as the first step.
pub fn transfer_swap_transfer_result() -> Value {
    let mut result = approve_swap_transfer_result();
    result[0]["assetChanges"] = json!([
        {
            "type": "Transfer",
            "from": SENDER.to_lowercase(),
            "to": RECEIVER.to_lowercase(),
            "rawAmount": "0x1e8480",
            "assetInfo": {"name": "USD Coin", "symbol": "usdc", "decimals": 6, "contractAddress": USDC.to_lowercase()}
        }
    ]);
    result
}

pub fn test_state(
    explorer: Arc<FakeExplorer>,
    chain: Arc<FakeChain>,
    simulation: Arc<FakeSimulation>,
) -> AppState {
    AppState::new(Config::default(), explorer, chain, simulation).unwrap()
}
