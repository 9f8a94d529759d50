use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use mender_common::Result;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CacheMetrics, CacheStore, CachedSelector, Counters};

/// Process-local store with least-recently-used eviction.
pub struct MemoryCacheStore {
    ttl: Duration,
    state: Mutex<MemoryState>,
}

struct MemoryState {
    entries: LruCache<String, CachedSelector>,
    counters: Counters,
}

impl MemoryCacheStore {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            state: Mutex::new(MemoryState {
                entries: LruCache::new(capacity),
                counters: Counters::default(),
            }),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CachedSelector> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(self.ttl, now), entry.clone()));

        match found {
            Some((false, entry)) => {
                state.counters.hits += 1;
                Some(entry)
            }
            Some((true, _)) => {
                state.entries.pop(key);
                state.counters.evictions += 1;
                state.counters.misses += 1;
                tracing::debug!(%key, "cache.memory.expired");
                None
            }
            None => {
                state.counters.misses += 1;
                None
            }
        }
    }

    async fn put(&self, key: &str, entry: CachedSelector) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some((evicted, _)) = state.entries.push(key.to_string(), entry) {
            // push hands back the old value when the key was already present
            if evicted != key {
                state.counters.evictions += 1;
                tracing::debug!(key = %evicted, "cache.memory.evicted_lru");
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock().await.entries.pop(key).is_some())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.counters = Counters::default();
        Ok(())
    }

    async fn size(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get_mut(key) {
            entry.update_success(success);
        }
        Ok(())
    }

    async fn evict_expired(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            state.entries.pop(key);
        }
        state.counters.evictions += expired.len() as u64;
        Ok(expired.len())
    }

    async fn metrics(&self) -> CacheMetrics {
        let state = self.state.lock().await;
        state.counters.metrics(state.entries.len())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
