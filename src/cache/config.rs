//! Cache configuration.
//!
//! Controls the read-through cache via the `[cache]` section of `murmur.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_COMMENT_TTL_SECS: u64 = 300;
const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every read goes straight to the store.
    pub enabled: bool,
    /// Lifetime of single comments, comment pages and reply lists.
    pub comment_ttl_seconds: u64,
    /// Capacity of the in-memory backend before LRU eviction.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            comment_ttl_seconds: DEFAULT_COMMENT_TTL_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            comment_ttl_seconds: settings.comment_ttl.as_secs(),
            max_entries: settings.max_entries.get(),
        }
    }
}

impl CacheConfig {
    pub fn comment_ttl(&self) -> Duration {
        Duration::from_secs(self.comment_ttl_seconds)
    }

    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.comment_ttl_seconds, 300);
        assert_eq!(config.max_entries, 10_000);
    }

    #[test]
    fn comment_ttl_reads_seconds() {
        let config = CacheConfig {
            comment_ttl_seconds: 5,
            ..Default::default()
        };
        assert_eq!(config.comment_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            max_entries: 0,
            ..Default::default()
        };
        assert_eq!(config.max_entries_non_zero().get(), 1);
    }
}
