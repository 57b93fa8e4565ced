//! Chain RPC client for Ethereum mainnet.
//!
//! Contract reads go through raw JSON-RPC `eth_call` requests. ENS resolution
//! goes through an `ethers` provider, which implements the registry and
//! resolver lookups.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers_providers::{Http, Middleware, Provider, ProviderError};
use ethers_core::types::{Bytes, U256};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::blockchain::{
    error::{Error, Result},
    models::TokenInfoResponse,
    services::{
        address::{parse_address, to_checksum_address},
        token::{decode_address, decode_string, decode_u256, encode_call},
    },
};

const PROVIDER: &str = "rpc";
const ENS_PROVIDER: &str = "ens";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// On-chain reads the resolver and tool surface depend on.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Address returned by `implementation()` on a proxy contract, checksummed.
    async fn implementation_address(&self, proxy: &str) -> Result<String>;

    async fn token_info(&self, token: &str) -> Result<TokenInfoResponse>;

    /// Forward ENS resolution. `name` must already be normalized.
    async fn resolve_name(&self, name: &str) -> Result<String>;

    /// Reverse ENS resolution of a checksummed address.
    async fn lookup_address(&self, address: &str) -> Result<String>;
}

/// Client for interacting with an EVM JSON-RPC endpoint
#[derive(Clone)]
pub struct EvmClient {
    client: Client,
    rpc_url: String,
    provider: Arc<Provider<Http>>,
    timeout: Duration,
}

impl EvmClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::remote(PROVIDER, format!("failed to build http client: {}", e)))?;
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Validation(format!("invalid RPC url {}: {}", rpc_url, e)))?;
        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            provider: Arc::new(provider),
            timeout,
        })
    }

    /// Executes `eth_call` against the latest block and returns the raw `result`.
    pub async fn eth_call(&self, to: &str, data: Bytes) -> Result<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [{"to": to, "data": format!("0x{}", hex::encode(&data))}, "latest"],
            "id": 1
        });
        let res = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::remote(
                PROVIDER,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }
        let v: Value = res
            .json()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;
        if let Some(err) = v.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(Error::remote(PROVIDER, format!("eth_call error: {}", message)));
        }
        Ok(v["result"].clone())
    }

    async fn call_no_args(&self, to: &str, sig: &str) -> Result<Value> {
        self.eth_call(to, encode_call(sig, vec![])).await
    }

    // ethers' provider has no per-request deadline of its own.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Error::remote(ENS_PROVIDER, e.to_string())),
            Err(_) => Err(Error::timeout(operation, self.timeout)),
        }
    }
}

#[async_trait]
impl ChainReader for EvmClient {
    async fn implementation_address(&self, proxy: &str) -> Result<String> {
        debug!("Reading implementation() of {}", proxy);
        let raw = self.call_no_args(proxy, "implementation()").await?;
        let implementation = decode_address(&raw).ok_or_else(|| {
            Error::remote(PROVIDER, format!("implementation() of {} returned {}", proxy, raw))
        })?;
        if implementation == ZERO_ADDRESS {
            return Err(Error::NotFound(format!("{} reports no implementation", proxy)));
        }
        to_checksum_address(&implementation)
    }

    async fn token_info(&self, token: &str) -> Result<TokenInfoResponse> {
        let contract_address = to_checksum_address(token)?;
        let (name_raw, symbol_raw, decimals_raw) = futures::try_join!(
            self.call_no_args(&contract_address, "name()"),
            self.call_no_args(&contract_address, "symbol()"),
            self.call_no_args(&contract_address, "decimals()"),
        )?;

        let name = decode_string(&name_raw)
            .ok_or_else(|| Error::remote(PROVIDER, format!("{} has no decodable name()", token)))?;
        let symbol = decode_string(&symbol_raw)
            .ok_or_else(|| Error::remote(PROVIDER, format!("{} has no decodable symbol()", token)))?;
        let decimals = decode_u256(&decimals_raw)
            .filter(|d| *d <= U256::from(u8::MAX))
            .ok_or_else(|| Error::remote(PROVIDER, format!("{} has no decodable decimals()", token)))?
            .as_u32();

        Ok(TokenInfoResponse {
            name,
            symbol,
            decimals,
            contract_address,
        })
    }

    async fn resolve_name(&self, name: &str) -> Result<String> {
        debug!("Resolving ENS name {}", name);
        let address = self
            .bounded("ens resolve", self.provider.resolve_name(name))
            .await?;
        if address.is_zero() {
            return Err(Error::NotFound(format!("ENS name {} is not registered", name)));
        }
        Ok(ethers::utils::to_checksum(&address, None))
    }

    async fn lookup_address(&self, address: &str) -> Result<String> {
        debug!("Reverse ENS lookup for {}", address);
        let parsed = parse_address(address)?;
        let name = self
            .bounded("ens lookup", self.provider.lookup_address(parsed))
            .await?;
        if name.is_empty() {
            return Err(Error::NotFound(format!("no ENS name for {}", address)));
        }
        Ok(name)
    }
}
