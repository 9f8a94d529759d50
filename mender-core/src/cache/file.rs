use async_trait::async_trait;
use chrono::Utc;
use mender_common::{MenderError, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CacheMetrics, CacheStore, CachedSelector, Counters};

const CACHE_FILE: &str = "selector-cache.json";

/// Durable store: a single JSON object mapping cache key to entry.
///
/// The whole document is loaded at open and rewritten after every mutation,
/// before the mutating call returns. When full, the oldest inserted entry is
/// evicted regardless of how recently it was read.
pub struct FileCacheStore {
    path: PathBuf,
    capacity: usize,
    ttl: Duration,
    state: Mutex<FileState>,
}

#[derive(Default)]
struct FileState {
    entries: HashMap<String, CachedSelector>,
    /// Keys in insertion order; overwriting a key keeps its slot.
    order: VecDeque<String>,
    counters: Counters,
}

impl FileState {
    fn forget(&mut self, key: &str) -> Option<CachedSelector> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }
}

impl FileCacheStore {
    /// Open (or create) the cache document under `directory`.
    ///
    /// A missing, unreadable, or corrupt document is logged and treated as
    /// empty. Entries older than `ttl` are dropped while loading.
    pub async fn open(directory: &Path, capacity: usize, ttl: Duration) -> Result<Self> {
        tokio::fs::create_dir_all(directory).await.map_err(|e| {
            MenderError::Cache(format!(
                "failed to create cache directory {}: {e}",
                directory.display()
            ))
        })?;
        let path = directory.join(CACHE_FILE);
        let state = load(&path, ttl).await;
        tracing::debug!(path = %path.display(), entries = state.entries.len(), "cache.file.loaded");

        Ok(Self {
            path,
            capacity: capacity.max(1),
            ttl,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, state: &FileState) -> Result<()> {
        let document: BTreeMap<&str, &CachedSelector> = state
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| MenderError::Cache(format!("failed to serialize cache: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| MenderError::Cache(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            MenderError::Cache(format!("failed to replace {}: {e}", self.path.display()))
        })?;
        Ok(())
    }
}

async fn load(path: &Path, ttl: Duration) -> FileState {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return FileState::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache.file.read_failed");
            return FileState::default();
        }
    };
    let document: HashMap<String, CachedSelector> = match serde_json::from_slice(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cache.file.corrupt");
            return FileState::default();
        }
    };

    let now = Utc::now();
    let mut live: Vec<(String, CachedSelector)> = document
        .into_iter()
        .filter(|(_, entry)| !entry.is_expired(ttl, now))
        .collect();
    // The document does not keep insertion order; creation time stands in.
    live.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then_with(|| a.0.cmp(&b.0)));

    let mut state = FileState::default();
    for (key, entry) in live {
        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }
    state
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Option<CachedSelector> {
        let mut state = self.state.lock().await;
        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(self.ttl, Utc::now()), entry.clone()));

        match found {
            Some((false, entry)) => {
                state.counters.hits += 1;
                Some(entry)
            }
            Some((true, _)) => {
                state.forget(key);
                state.counters.evictions += 1;
                state.counters.misses += 1;
                if let Err(e) = self.flush(&state).await {
                    tracing::warn!(error = %e, "cache.file.flush_failed");
                }
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
        if let Some(slot) = state.entries.get_mut(key) {
            *slot = entry;
        } else {
            while state.entries.len() >= self.capacity {
                let Some(oldest) = state.order.pop_front() else {
                    break;
                };
                state.entries.remove(&oldest);
                state.counters.evictions += 1;
                tracing::debug!(key = %oldest, "cache.file.evicted_oldest");
            }
            state.order.push_back(key.to_string());
            state.entries.insert(key.to_string(), entry);
        }
        self.flush(&state).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.forget(key).is_none() {
            return Ok(false);
        }
        self.flush(&state).await?;
        Ok(true)
    }

    async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = FileState::default();
        self.flush(&state).await
    }

    async fn size(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    async fn update_success(&self, key: &str, success: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.entries.get_mut(key) {
            Some(entry) => entry.update_success(success),
            None => return Ok(()),
        }
        self.flush(&state).await
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
        if expired.is_empty() {
            return Ok(0);
        }
        for key in &expired {
            state.forget(key);
        }
        state.counters.evictions += expired.len() as u64;
        self.flush(&state).await?;
        Ok(expired.len())
    }

    async fn metrics(&self) -> CacheMetrics {
        let state = self.state.lock().await;
        state.counters.metrics(state.entries.len())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileCacheStore::open(dir.path(), 10, TTL).await.unwrap();
            store
                .put("#username-field|Username input field", CachedSelector::new("#user-name"))
                .await
                .unwrap();
            store
                .update_success("#username-field|Username input field", true)
                .await
                .unwrap();
        }
        let reopened = FileCacheStore::open(dir.path(), 10, TTL).await.unwrap();
        let entry = reopened
            .get("#username-field|Username input field")
            .await
            .unwrap();
        assert_eq!(entry.selector, "#user-name");
        assert_eq!(entry.success_count, 1);
    }

    #[tokio::test]
    async fn oldest_inserted_is_evicted_even_if_recently_read() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::open(dir.path(), 2, TTL).await.unwrap();
        store.put("a", CachedSelector::new("#a")).await.unwrap();
        store.put("b", CachedSelector::new("#b")).await.unwrap();
        assert!(store.get("a").await.is_some());
        store.put("c", CachedSelector::new("#c")).await.unwrap();

        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_some());
        assert_eq!(store.metrics().await.eviction_count, 1);
    }

    #[tokio::test]
    async fn corrupt_document_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), b"{ not json").unwrap();
        let store = FileCacheStore::open(dir.path(), 10, TTL).await.unwrap();
        assert_eq!(store.size().await, 0);
        // and the next write replaces the garbage
        store.put("k", CachedSelector::new("#k")).await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"#k\""));
    }

    #[tokio::test]
    async fn expired_entries_are_dropped_on_load() {
        let dir = TempDir::new().unwrap();
        let mut old = CachedSelector::new("#old");
        old.timestamp = Utc::now() - TimeDelta::hours(5);
        let doc = serde_json::json!({
            "old|x": old,
            "new|y": CachedSelector::new("#new"),
        });
        std::fs::write(dir.path().join(CACHE_FILE), doc.to_string()).unwrap();

        let store = FileCacheStore::open(dir.path(), 10, TTL).await.unwrap();
        assert_eq!(store.size().await, 1);
        assert!(store.get("new|y").await.is_some());
    }

    #[tokio::test]
    async fn every_mutation_is_on_disk_before_returning() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::open(dir.path(), 10, TTL).await.unwrap();
        let on_disk = || -> HashMap<String, CachedSelector> {
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap()
        };

        store.put("k", CachedSelector::new("#k")).await.unwrap();
        assert_eq!(on_disk()["k"].selector, "#k");

        store.update_success("k", false).await.unwrap();
        assert_eq!(on_disk()["k"].failure_count, 1);

        assert!(store.remove("k").await.unwrap());
        assert!(on_disk().is_empty());
        assert!(!store.remove("k").await.unwrap());

        store.put("j", CachedSelector::new("#j")).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(on_disk().is_empty());
    }
}
