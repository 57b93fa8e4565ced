// src/blockchain/cache.rs

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::blockchain::error::{Error, Result};

/// Size and expiry bounds for a [`MemoCache`]. `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub capacity: Option<u64>,
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub const DEFAULT_CAPACITY: u64 = 1_000;

    pub fn unbounded() -> Self {
        Self {
            capacity: None,
            ttl: None,
        }
    }

    pub fn bounded(capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Memoization table for remote lookups, keyed by a canonical string built
/// from the resolved inputs (e.g. `abi:0xdAC1...`).
///
/// Only successful results are stored. Concurrent callers asking for the same
/// missing key share a single initializer.
#[derive(Clone)]
pub struct MemoCache<V> {
    inner: Cache<String, V>,
}

impl<V> MemoCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(policy: CachePolicy) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = policy.capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(ttl) = policy.ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn get_or_try_insert<F>(&self, key: String, init: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        self.inner
            .try_get_with(key, init)
            .await
            .map_err(|err: Arc<Error>| Arc::try_unwrap(err).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}
