// src/blockchain/services/explorer.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::blockchain::{
    error::{Error, Result},
    models::AbiEntry,
};

const PROVIDER: &str = "etherscan";

/// Block-explorer lookups used by the ABI resolver.
#[async_trait]
pub trait BlockExplorer: Send + Sync {
    /// Verified ABI of the contract at `address`.
    async fn contract_abi(&self, address: &str) -> Result<Vec<AbiEntry>>;

    /// Implementation address the explorer reports for a proxy, if any.
    async fn implementation_address(&self, address: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ExplorerResponse {
    // A non-"1" status carries a human-readable reason in `result`.
    fn into_result(self) -> Result<Value> {
        if self.status == "1" {
            return Ok(self.result);
        }
        let reason = match self.result {
            Value::String(s) if !s.is_empty() => s,
            Value::Null => self.message,
            other => other.to_string(),
        };
        Err(Error::remote(PROVIDER, reason))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceCodeEntry {
    #[serde(default)]
    implementation: String,
}

/// Etherscan-compatible `module=contract` API client.
#[derive(Clone)]
pub struct EtherscanClient {
    client: Client,
    api_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl EtherscanClient {
    pub fn new(api_url: &str, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::remote(PROVIDER, format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key,
            timeout,
        })
    }

    async fn get_contract(&self, action: &str, address: &str) -> Result<Value> {
        debug!("Etherscan {} for {}", action, address);
        let res = self
            .client
            .get(&self.api_url)
            .query(&[
                ("module", "contract"),
                ("action", action),
                ("address", address),
                ("apikey", self.api_key.expose_secret().as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| Error::from_reqwest(PROVIDER, e, self.timeout))?;
        if !status.is_success() {
            return Err(Error::remote(
                PROVIDER,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }
        let parsed: ExplorerResponse = serde_json::from_str(&body)
            .map_err(|e| Error::remote(PROVIDER, format!("malformed response: {}", e)))?;
        parsed.into_result()
    }
}

#[async_trait]
impl BlockExplorer for EtherscanClient {
    async fn contract_abi(&self, address: &str) -> Result<Vec<AbiEntry>> {
        let result = self.get_contract("getabi", address).await?;
        // The ABI arrives as a JSON document encoded inside a string.
        let raw = result
            .as_str()
            .ok_or_else(|| Error::remote(PROVIDER, "getabi result is not a string"))?;
        serde_json::from_str(raw)
            .map_err(|e| Error::remote(PROVIDER, format!("malformed ABI for {}: {}", address, e)))
    }

    async fn implementation_address(&self, address: &str) -> Result<Option<String>> {
        let result = self.get_contract("getsourcecode", address).await?;
        let entries: Vec<SourceCodeEntry> = serde_json::from_value(result).map_err(|e| {
            Error::remote(PROVIDER, format!("malformed source code for {}: {}", address, e))
        })?;
        Ok(entries
            .into_iter()
            .next()
            .map(|entry| entry.implementation)
            .filter(|implementation| !implementation.is_empty()))
    }
}
