// src/blockchain/services/ens.rs

use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::blockchain::{
    cache::{CachePolicy, MemoCache},
    client::ChainReader,
    error::Result,
    services::address::{normalize_ens_name, to_checksum_address},
};

/// Memoized forward and reverse ENS resolution.
#[derive(Clone)]
pub struct EnsResolver {
    chain: Arc<dyn ChainReader>,
    forward: MemoCache<String>,
    reverse: MemoCache<String>,
}

impl EnsResolver {
    pub fn new(chain: Arc<dyn ChainReader>, policy: CachePolicy) -> Self {
        Self {
            chain,
            forward: MemoCache::new(policy),
            reverse: MemoCache::new(policy),
        }
    }

    /// Resolves `name` (`.eth` appended when it has no TLD) to a checksum address.
    pub async fn resolve(&self, name: &str) -> Result<String> {
        let name = normalize_ens_name(name);
        self.forward
            .get_or_try_insert(format!("ens:{}", name), async {
                debug!("ENS cache miss for {}", name);
                self.chain.resolve_name(&name).await
            })
            .await
    }

    /// Resolves every name concurrently. Results line up with `names`.
    pub async fn resolve_many(&self, names: &[String]) -> Vec<Result<String>> {
        join_all(names.iter().map(|name| self.resolve(name))).await
    }

    /// Primary ENS name of `address`.
    pub async fn lookup(&self, address: &str) -> Result<String> {
        let address = to_checksum_address(address)?;
        self.reverse
            .get_or_try_insert(format!("ens-reverse:{}", address), async {
                self.chain.lookup_address(&address).await
            })
            .await
    }
}
