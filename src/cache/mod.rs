//! Read-through cache for comment reads.
//!
//! Comment pages, single comments and reply lists are cached as JSON
//! snapshots and invalidated by glob pattern after every mutation. The key
//! layout is shared with the post and user stores, so invalidating one family
//! can reach entries owned by another.
//!
//! ```toml
//! [cache]
//! enabled = true
//! comment_ttl_seconds = 300
//! max_entries = 10000
//! ```

mod config;
mod coordinator;
mod keys;
mod lock;
mod pattern;
mod store;

pub use config::CacheConfig;
pub use coordinator::CacheCoordinator;
pub use keys::{CacheKey, KeyPattern};
pub use pattern::glob_match;
pub use store::{CacheBackend, CacheError, MemoryCacheBackend, NoopCacheBackend};

pub(crate) use coordinator::{
    METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED, METRIC_CACHE_MISS,
};
