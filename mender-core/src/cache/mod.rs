//! Selector cache: the trust-scored entry model and the store contract.
//!
//! Two interchangeable backends implement [`CacheStore`]:
//!
//! - [`MemoryCacheStore`]: bounded, least-recently-used eviction, process-local
//! - [`FileCacheStore`]: one JSON document on disk, oldest-inserted eviction,
//!   rewritten in full on every mutation
//!
//! Both treat an expired entry as a miss and evict it on the way out.
//! Hit/miss/eviction counters live for the lifetime of the store and are
//! reset only by [`CacheStore::clear_all`].

mod entry;
mod file;
mod memory;

pub use entry::{CachedSelector, TRUST_THRESHOLD};
pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use async_trait::async_trait;
use mender_common::{CacheBackend, CacheConfig, Result};
use serde::Serialize;
use std::sync::Arc;

/// Cache key for a selector paired with the intent it was healed for.
///
/// ```
/// assert_eq!(
///     mender_core::cache::cache_key("#username-field", "Username input field"),
///     "#username-field|Username input field"
/// );
/// ```
pub fn cache_key(selector: &str, description: &str) -> String {
    format!("{selector}|{description}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hit_count: u64,
    pub miss_count: u64,
    /// `hits / (hits + misses)`, 0 before the first lookup.
    pub hit_rate: f64,
    pub total_entries: usize,
    pub eviction_count: u64,
}

/// Lifetime counters shared by both backends.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Counters {
    pub fn metrics(&self, total_entries: usize) -> CacheMetrics {
        let lookups = self.hits + self.misses;
        CacheMetrics {
            hit_count: self.hits,
            miss_count: self.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                self.hits as f64 / lookups as f64
            },
            total_entries,
            eviction_count: self.evictions,
        }
    }
}

/// Storage contract for healed selectors.
///
/// Implementations must be safe under concurrent use. Concurrent `put`s to
/// one key are last-writer-wins; `update_success` counters are never lost.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Live entry for `key`; expired entries count as misses and are evicted.
    async fn get(&self, key: &str) -> Option<CachedSelector>;

    /// Insert or overwrite.
    async fn put(&self, key: &str, entry: CachedSelector) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<bool>;

    /// Drop every entry and reset the counters.
    async fn clear_all(&self) -> Result<()>;

    async fn size(&self) -> usize;

    /// Record one more success or failure for `key`. Unknown keys are ignored.
    async fn update_success(&self, key: &str, success: bool) -> Result<()>;

    /// Remove every expired entry, returning how many went.
    async fn evict_expired(&self) -> Result<usize>;

    async fn metrics(&self) -> CacheMetrics;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the backend named in `config`.
pub async fn open_cache_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config.capacity, config.ttl())),
        CacheBackend::File => Arc::new(
            FileCacheStore::open(&config.directory, config.capacity, config.ttl()).await?,
        ),
    };
    tracing::info!(
        backend = store.name(),
        capacity = config.capacity,
        ttl_secs = config.ttl_secs,
        "cache.opened"
    );
    Ok(store)
}
