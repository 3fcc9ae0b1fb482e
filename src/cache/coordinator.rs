//! Read-through cache coordinator.
//!
//! Services hold one [`CacheCoordinator`] and never touch a backend
//! directly. Every backend failure is absorbed here: reads fall back to the
//! compute closure and invalidations are logged and dropped, leaving the TTL
//! to bound staleness.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::CacheConfig;
use super::keys::{CacheKey, KeyPattern};
use super::store::{CacheBackend, CacheError, MemoryCacheBackend, NoopCacheBackend};

pub(crate) const METRIC_CACHE_HIT: &str = "murmur_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "murmur_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "murmur_cache_error_total";
pub(crate) const METRIC_CACHE_INVALIDATED: &str = "murmur_cache_invalidated_keys_total";

#[derive(Clone)]
pub struct CacheCoordinator {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl CacheCoordinator {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Build the backend the configuration asks for: an in-memory LRU when
    /// enabled, a no-op otherwise.
    pub fn from_config(config: CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = if config.enabled {
            Arc::new(MemoryCacheBackend::new(&config))
        } else {
            Arc::new(NoopCacheBackend)
        };
        Self::new(backend, config)
    }

    pub fn disabled() -> Self {
        Self::from_config(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Return the cached value for `key`, or compute, store and return it.
    /// The entry lives for the TTL of the key's class.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &CacheKey, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = key.ttl(&self.config);
        self.get_or_compute_with_ttl(&key.to_string(), ttl, compute)
            .await
    }

    /// Same as [`get_or_compute`](Self::get_or_compute) with an explicit key
    /// string and TTL.
    ///
    /// Errors from `compute` are returned untouched and nothing is stored.
    pub async fn get_or_compute_with_ttl<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return compute().await;
        }

        let family = key_family(key);
        let backend_healthy = match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    counter!(METRIC_CACHE_HIT, "family" => family.clone()).increment(1);
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    record_error("decode", key, &CacheError::from(err));
                    true
                }
            },
            Ok(None) => true,
            Err(err) => {
                record_error("get", key, &err);
                false
            }
        };

        counter!(METRIC_CACHE_MISS, "family" => family).increment(1);
        debug!(key, "cache miss");
        let value = compute().await?;

        if backend_healthy {
            self.store(key, &value, ttl).await;
        }
        Ok(value)
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                record_error("encode", key, &CacheError::from(err));
                return;
            }
        };
        if let Err(err) = self.backend.set_with_ttl(key, raw, ttl).await {
            record_error("set", key, &err);
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let key = key.to_string();
        match self.backend.delete(&key).await {
            Ok(removed) => record_invalidated(&key, u64::from(removed)),
            Err(err) => record_error("delete", &key, &err),
        }
    }

    pub async fn invalidate_many(&self, keys: &[CacheKey]) {
        if keys.is_empty() {
            return;
        }
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let label = keys.join(",");
        match self.backend.delete_many(&keys).await {
            Ok(removed) => record_invalidated(&label, removed),
            Err(err) => record_error("delete_many", &label, &err),
        }
    }

    pub async fn invalidate_pattern(&self, pattern: &KeyPattern) {
        if let KeyPattern::Exact(key) = pattern {
            self.invalidate(key).await;
            return;
        }
        let pattern = pattern.to_string();
        match self.backend.delete_by_pattern(&pattern).await {
            Ok(removed) => record_invalidated(&pattern, removed),
            Err(err) => record_error("delete_by_pattern", &pattern, &err),
        }
    }

    async fn invalidate_all(&self, patterns: Vec<KeyPattern>) {
        for pattern in &patterns {
            self.invalidate_pattern(pattern).await;
        }
    }

    /// Drop everything a comment mutation may have made stale.
    pub async fn comment_changed(&self, post_id: Uuid, comment_id: Uuid, parent_id: Option<Uuid>) {
        self.invalidate_all(comment_patterns(post_id, comment_id, parent_id))
            .await;
    }

    /// Drop the post's entries, every post list, and the post's comment pages.
    pub async fn post_changed(&self, post_id: Uuid, author_id: Option<Uuid>) {
        self.invalidate_all(post_patterns(post_id, author_id)).await;
    }
}

pub(crate) fn comment_patterns(
    post_id: Uuid,
    comment_id: Uuid,
    parent_id: Option<Uuid>,
) -> Vec<KeyPattern> {
    let mut patterns = vec![
        KeyPattern::PostComments(post_id),
        KeyPattern::Exact(CacheKey::Comment(comment_id)),
        KeyPattern::CommentReplies(comment_id),
    ];
    if let Some(parent_id) = parent_id {
        patterns.push(KeyPattern::Exact(CacheKey::Comment(parent_id)));
        patterns.push(KeyPattern::CommentReplies(parent_id));
    }
    patterns
}

pub(crate) fn post_patterns(post_id: Uuid, author_id: Option<Uuid>) -> Vec<KeyPattern> {
    let mut patterns = vec![
        KeyPattern::Post(post_id),
        KeyPattern::AllPostSlugs,
        KeyPattern::AllPostLists,
    ];
    if let Some(author_id) = author_id {
        patterns.push(KeyPattern::UserPosts(author_id));
    }
    patterns.push(KeyPattern::PostComments(post_id));
    patterns
}

fn key_family(key: &str) -> String {
    key.split(':').next().unwrap_or(key).to_string()
}

fn record_error(op: &'static str, key: &str, err: &CacheError) {
    counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
    warn!(op, key, error = %err, "cache backend error ignored");
}

fn record_invalidated(target: &str, removed: u64) {
    if removed > 0 {
        counter!(METRIC_CACHE_INVALIDATED).increment(removed);
    }
    debug!(target, removed, "cache invalidated");
}
