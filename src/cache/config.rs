//! Configuration for the index caches

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};

/// Configuration shared by every cache facade
///
/// This is a correctness cache, so there are no TTL or size knobs; the only
/// policy decisions are whether to memoize at all and whether to count
/// hits and misses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memoize query results. When false every read recomputes from the raw
    /// index (still windowed and sorted), which is useful when bisecting a
    /// suspected stale read.
    pub caching_enabled: bool,

    /// Track hit/miss/invalidation counters
    pub collect_stats: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            collect_stats: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Pass-through preset: every read goes to the raw index.
    pub fn passthrough() -> Self {
        Self {
            caching_enabled: false,
            collect_stats: false,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.caching_enabled && self.collect_stats {
            return Err(IndexError::Config(
                "collect_stats has no effect with caching disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    caching_enabled: Option<bool>,
    collect_stats: Option<bool>,
}

impl CacheConfigBuilder {
    /// Enable or disable memoization
    pub fn caching_enabled(mut self, enabled: bool) -> Self {
        self.caching_enabled = Some(enabled);
        self
    }

    /// Enable or disable stats collection
    pub fn collect_stats(mut self, collect: bool) -> Self {
        self.collect_stats = Some(collect);
        self
    }

    /// Build and validate the cache configuration
    pub fn build(self) -> Result<CacheConfig> {
        let defaults = CacheConfig::default();
        let caching_enabled = self.caching_enabled.unwrap_or(defaults.caching_enabled);
        let config = CacheConfig {
            caching_enabled,
            // Stats follow caching unless set explicitly
            collect_stats: self.collect_stats.unwrap_or(caching_enabled),
        };
        config.validate()?;
        Ok(config)
    }
}
