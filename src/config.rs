// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;

use crate::blockchain::{cache::CachePolicy, services::abi::ProxyStrategy};

pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/api";
pub const DEFAULT_TENDERLY_GATEWAY_URL: &str = "https://mainnet.gateway.tenderly.co";

// A struct to hold all configuration, loaded once at startup from the .env file.
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,

    // External services
    pub etherscan_api_url: String,
    pub etherscan_api_key: SecretString,
    pub tenderly_gateway_url: String,
    pub tenderly_api_key: SecretString,
    /// Ethereum mainnet JSON-RPC endpoint, used for `eth_call` and ENS
    pub chain_rpc_url: String,

    /// Upper bound on every outgoing request
    pub request_timeout: Duration,

    // ABI resolution
    pub cache_policy: CachePolicy,
    pub max_proxy_redirects: usize,
    pub proxy_strategy: ProxyStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            etherscan_api_url: DEFAULT_ETHERSCAN_API_URL.to_string(),
            etherscan_api_key: SecretString::new(String::new()),
            tenderly_gateway_url: DEFAULT_TENDERLY_GATEWAY_URL.to_string(),
            tenderly_api_key: SecretString::new(String::new()),
            chain_rpc_url: "http://127.0.0.1:8545".to_string(),
            request_timeout: Duration::from_secs(30),
            cache_policy: CachePolicy::bounded(CachePolicy::DEFAULT_CAPACITY),
            max_proxy_redirects: 2,
            proxy_strategy: ProxyStrategy::default(),
        }
    }
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{} must be valid: {}", key, e))
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let etherscan_api_key = env::var("ETHERSCAN_API_KEY")
            .context("ETHERSCAN_API_KEY must be set")?;
        let tenderly_api_key = env::var("TENDERLY_API_KEY")
            .context("TENDERLY_API_KEY must be set")?;

        // An explicit RPC URL wins over the Infura key
        let chain_rpc_url = match env::var("CHAIN_RPC_URL") {
            Ok(url) => url,
            Err(_) => {
                let infura_key = env::var("INFURA_API_KEY")
                    .context("CHAIN_RPC_URL or INFURA_API_KEY must be set")?;
                format!("https://mainnet.infura.io/v3/{}", infura_key)
            }
        };
        url::Url::parse(&chain_rpc_url).context("CHAIN_RPC_URL must be a valid URL")?;

        let capacity: u64 = env_or("ABI_CACHE_CAPACITY", "1000")?;
        let ttl_secs: u64 = env_or("ABI_CACHE_TTL_SECS", "0")?;
        let mut cache_policy = if capacity == 0 {
            CachePolicy::unbounded()
        } else {
            CachePolicy::bounded(capacity)
        };
        if ttl_secs > 0 {
            cache_policy = cache_policy.with_ttl(Duration::from_secs(ttl_secs));
        }

        Ok(Config {
            // Server settings
            port: env_or("PORT", "8080")?,

            // External services
            etherscan_api_url: env::var("ETHERSCAN_API_URL")
                .unwrap_or_else(|_| DEFAULT_ETHERSCAN_API_URL.to_string()),
            etherscan_api_key: SecretString::new(etherscan_api_key),
            tenderly_gateway_url: env::var("TENDERLY_GATEWAY_URL")
                .unwrap_or_else(|_| DEFAULT_TENDERLY_GATEWAY_URL.to_string()),
            tenderly_api_key: SecretString::new(tenderly_api_key),
            chain_rpc_url,

            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", "30")?),

            // ABI resolution
            cache_policy,
            max_proxy_redirects: env_or("MAX_PROXY_REDIRECTS", "2")?,
            proxy_strategy: env_or("PROXY_STRATEGY", "abi")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_proxy_redirects, 2);
        assert_eq!(config.proxy_strategy, ProxyStrategy::ImplementationFunction);
        assert_eq!(config.cache_policy.capacity, Some(1_000));
        assert_eq!(config.cache_policy.ttl, None);
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug_output() {
        let config = Config {
            tenderly_api_key: SecretString::new("super-secret".to_string()),
            ..Config::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
