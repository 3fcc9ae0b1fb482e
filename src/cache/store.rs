//! Cache backends.
//!
//! The coordinator only talks to [`CacheBackend`]; the in-process
//! [`MemoryCacheBackend`] is the default implementation, [`NoopCacheBackend`]
//! stands in when caching is disabled.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::lock::mutex_lock;
use super::pattern::glob_match;

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT: &str = "murmur_cache_evict_total";

/// Failure inside the cache layer. Never surfaced to callers of the comment
/// services; the coordinator logs it and falls through to the store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache payload could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Key-value store with per-entry expiry and glob deletion.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
    -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Returns the number of entries removed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheError> {
        let mut removed = 0;
        for key in keys {
            if self.delete(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Returns the number of entries removed.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let keys = self.list_keys(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        self.delete_many(&keys).await
    }
}

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-process LRU cache with TTL expiry.
///
/// Expired entries are dropped lazily on access and during pattern scans.
pub struct MemoryCacheBackend {
    entries: Mutex<LruCache<String, MemoryEntry>>,
}

impl MemoryCacheBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until next touched.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut LruCache<String, MemoryEntry>, now: Instant) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            entries.pop(&key);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let evicted =
            mutex_lock(&self.entries, SOURCE, "set_with_ttl").push(key.to_string(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(mutex_lock(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some())
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "list_keys");
        Self::purge_expired(&mut entries, now);
        Ok(entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_by_pattern");
        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        let mut removed = 0;
        for key in matching {
            if entries.pop(&key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Backend used when caching is disabled: every read misses, writes vanish.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCacheBackend;

#[async_trait]
impl CacheBackend for NoopCacheBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn list_keys(&self, _pattern: &str) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }
}
