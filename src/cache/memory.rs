/// In-process cache store
///
/// Backs `CACHE_STORE=memory` for single-instance deployments. Entries
/// expire lazily on read.
use crate::{cache::CacheStore, error::ValidatorResult};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Whether an unexpired entry exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(key)
                    .map(|(_, expires_at)| Instant::now() < *expires_at)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> ValidatorResult<Option<String>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| crate::error::ValidatorError::Cache("memory store poisoned".to_string()))?;

        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> ValidatorResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries
            .lock()
            .map_err(|_| crate::error::ValidatorError::Cache("memory store poisoned".to_string()))?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn close(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
