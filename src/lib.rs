// src/lib.rs

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

// Re-export modules
pub mod api;
pub mod blockchain;
pub mod config;
pub mod mcp;
pub mod utils;

use blockchain::{
    client::{ChainReader, EvmClient},
    error::Result,
    services::{
        abi::{AbiCache, AbiResolver, ResolverOptions},
        ens::EnsResolver,
        explorer::{BlockExplorer, EtherscanClient},
        simulation::{SimulationProvider, Simulator, TenderlyClient},
    },
};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: config::Config,
    /// Proxy-aware ABI lookups
    pub resolver: Arc<AbiResolver>,
    /// Bundle simulation
    pub simulator: Simulator,
    /// Memoized ENS lookups
    pub ens: EnsResolver,
    /// On-chain reads (token metadata)
    pub chain: Arc<dyn ChainReader>,
}

impl AppState {
    /// Wires the services around the given collaborators.
    pub fn new(
        config: config::Config,
        explorer: Arc<dyn BlockExplorer>,
        chain: Arc<dyn ChainReader>,
        simulation: Arc<dyn SimulationProvider>,
    ) -> Result<Self> {
        let options = ResolverOptions {
            strategy: config.proxy_strategy,
            max_redirects: config.max_proxy_redirects,
            cache: config.cache_policy,
        };
        let builtin = AbiCache::builtin()?;
        debug!("Loaded {} built-in ABI keys", builtin.len());
        let resolver = AbiResolver::new(
            Arc::new(builtin),
            explorer,
            Arc::clone(&chain),
            options,
        );
        let ens = EnsResolver::new(Arc::clone(&chain), config.cache_policy);

        Ok(Self {
            config,
            resolver: Arc::new(resolver),
            simulator: Simulator::new(simulation),
            ens,
            chain,
        })
    }

    /// Builds the Etherscan, Tenderly and RPC clients described by `config`.
    pub fn from_config(config: config::Config) -> anyhow::Result<Self> {
        let timeout = config.request_timeout;
        let explorer = EtherscanClient::new(
            &config.etherscan_api_url,
            config.etherscan_api_key.clone(),
            timeout,
        )
        .context("Failed to initialize explorer client")?;
        let tenderly = TenderlyClient::new(
            &config.tenderly_gateway_url,
            config.tenderly_api_key.clone(),
            timeout,
        )
        .context("Failed to initialize simulation client")?;
        let evm_client = EvmClient::new(&config.chain_rpc_url, timeout)
            .context("Failed to initialize EVM client")?;

        Self::new(
            config,
            Arc::new(explorer),
            Arc::new(evm_client),
            Arc::new(tenderly),
        )
        .context("Failed to build application state")
    }
}
