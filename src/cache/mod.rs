/// Resolution cache for the ORGiD validator
///
/// Cache-aside store mapping an identifier to its last resolution result.
/// Store failures never fail a request: reads degrade to a miss and writes
/// to a no-op, and both are logged and counted.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::{
    config::{CacheBackend, CacheConfig},
    error::{ValidatorError, ValidatorResult},
    identity::ResolutionResult,
    metrics,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// Key/value backend holding serialized resolution results
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> ValidatorResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl_secs`
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> ValidatorResult<()>;

    /// Release any connection held by the store
    async fn close(&self) {}
}

/// Result of a cache read
#[derive(Debug)]
pub enum CacheRead {
    Hit(ResolutionResult),
    Miss,
    Disabled,
    /// Store failed; treated as a miss
    Degraded(ValidatorError),
}

/// Result of a cache write
#[derive(Debug)]
pub enum CacheWrite {
    Stored,
    Disabled,
    /// Store failed; treated as a no-op
    Degraded(ValidatorError),
}

/// Resolution cache
#[derive(Clone)]
pub struct ResolutionCache {
    store: Option<Arc<dyn CacheStore>>,
    key_prefix: String,
    ttl_secs: u64,
}

impl ResolutionCache {
    pub fn new(store: Arc<dyn CacheStore>, key_prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            store: Some(store),
            key_prefix: key_prefix.into(),
            ttl_secs,
        }
    }

    /// Permanently cold cache: reads miss, writes do nothing
    pub fn disabled() -> Self {
        Self {
            store: None,
            key_prefix: crate::config::CACHE_KEY_PREFIX.to_string(),
            ttl_secs: 0,
        }
    }

    /// Build from configuration. A Redis connection is opened on first use.
    pub fn from_config(config: &CacheConfig) -> ValidatorResult<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }

        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Redis => Arc::new(RedisStore::new(
                &config.redis_url(),
                config.connect_timeout_secs,
            )?),
            CacheBackend::Memory => Arc::new(MemoryStore::new()),
        };

        Ok(Self::new(store, config.key_prefix.clone(), config.expiry_secs))
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Build a cache key with prefix
    pub fn build_key(&self, did: &str) -> String {
        format!("{}{}", self.key_prefix, did)
    }

    /// Read with the outcome made explicit
    pub async fn lookup(&self, did: &str) -> CacheRead {
        let Some(store) = &self.store else {
            metrics::record_cache_read("disabled");
            return CacheRead::Disabled;
        };

        let key = self.build_key(did);
        debug!("Cache GET: {}", key);

        let read = match store.get(&key).await {
            Ok(Some(json)) => match serde_json::from_str::<ResolutionResult>(&json) {
                Ok(result) => CacheRead::Hit(result),
                Err(e) => CacheRead::Degraded(ValidatorError::Cache(format!(
                    "Failed to deserialize cached value: {}",
                    e
                ))),
            },
            Ok(None) => CacheRead::Miss,
            Err(e) => CacheRead::Degraded(e),
        };

        match &read {
            CacheRead::Hit(_) => {
                debug!("Cache HIT: {}", key);
                metrics::record_cache_read("hit");
            }
            CacheRead::Miss => {
                debug!("Cache MISS: {}", key);
                metrics::record_cache_read("miss");
            }
            CacheRead::Degraded(e) => {
                error!("Cache get error for {}: {}", key, e);
                metrics::record_cache_degraded("get");
            }
            CacheRead::Disabled => {}
        }

        read
    }

    /// Get a cached resolution result, absent on miss, disabled cache or store failure
    pub async fn get(&self, did: &str) -> Option<ResolutionResult> {
        match self.lookup(did).await {
            CacheRead::Hit(result) => Some(result),
            _ => None,
        }
    }

    /// Store a resolution result, whatever its outcome, for the configured TTL
    pub async fn put(&self, did: &str, result: &ResolutionResult) -> CacheWrite {
        let Some(store) = &self.store else {
            metrics::record_cache_write("disabled");
            return CacheWrite::Disabled;
        };

        let key = self.build_key(did);
        debug!("Cache SET: {} (TTL: {}s)", key, self.ttl_secs);

        let written = match serde_json::to_string(result) {
            Ok(json) => store.set_ex(&key, &json, self.ttl_secs).await,
            Err(e) => Err(ValidatorError::Cache(format!(
                "Cache serialization failed: {}",
                e
            ))),
        };

        match written {
            Ok(()) => {
                metrics::record_cache_write("stored");
                CacheWrite::Stored
            }
            Err(e) => {
                error!("Cache store error for {}: {}", key, e);
                metrics::record_cache_degraded("set");
                CacheWrite::Degraded(e)
            }
        }
    }

    /// Release the store connection
    pub async fn close(&self) {
        if let Some(store) = &self.store {
            store.close().await;
        }
    }
}
