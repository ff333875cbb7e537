//! Memoization store and the shared read path
//!
//! One [`MemoStore`] instance lives inside each cache facade. It maps a query
//! shape (a category tag, a filter, and an optional ordering identity) to
//! the fully materialized, unwindowed result sequence computed for it. There
//! is no TTL and no LRU: this is a correctness cache, and entries live until
//! an invalidation clears their tag or the facade closes.
//!
//! The store is partitioned by tag so that invalidating a whole namespace is
//! proportional to that namespace, not to the total cache size.

use crate::cache::config::CacheConfig;
use crate::cache::order::SortOrder;
use crate::cache::page::Page;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Cache key within one tag partition: filter plus ordering identity.
///
/// Paging parameters are deliberately absent: every `(offset, limit)` window
/// of the same logical query shares one cached materialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey<K> {
    pub filter: K,
    pub ordering: Option<String>,
}

impl<K> ShapeKey<K> {
    pub fn new(filter: K, ordering: Option<&str>) -> Self {
        Self {
            filter,
            ordering: ordering.map(str::to_owned),
        }
    }
}

/// Hit/miss/invalidation counters for one facade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads served from a memoized sequence
    pub hits: u64,

    /// Reads that had to consult the raw index
    pub misses: u64,

    /// Entries dropped by invalidation sweeps
    pub invalidations: u64,

    /// Memoized sequences currently held
    pub entries: usize,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Merge counters from another facade-internal memo.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.invalidations += other.invalidations;
        self.entries += other.entries;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ hits: {}, misses: {}, hit_rate: {:.2}%, entries: {}, invalidations: {} }}",
            self.hits,
            self.misses,
            self.hit_rate(),
            self.entries,
            self.invalidations
        )
    }
}

/// Tag-partitioned shape-to-sequence map
pub struct MemoStore<T, K, V> {
    partitions: HashMap<T, HashMap<ShapeKey<K>, Arc<Vec<V>>>>,
}

impl<T, K, V> MemoStore<T, K, V>
where
    T: Copy + Eq + Hash + fmt::Debug,
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            partitions: HashMap::new(),
        }
    }

    /// Previously memoized sequence for the shape, if any.
    pub fn read(&self, tag: T, key: &ShapeKey<K>) -> Option<Arc<Vec<V>>> {
        self.partitions.get(&tag).and_then(|p| p.get(key)).cloned()
    }

    /// Memoize a full sequence under the shape, overwriting any prior entry.
    pub fn store(&mut self, tag: T, key: ShapeKey<K>, seq: Vec<V>) -> Arc<Vec<V>> {
        let seq = Arc::new(seq);
        self.partitions
            .entry(tag)
            .or_default()
            .insert(key, Arc::clone(&seq));
        seq
    }

    /// Drop every entry in one tag namespace; returns how many were dropped.
    pub fn clear_tag(&mut self, tag: T) -> usize {
        match self.partitions.remove(&tag) {
            Some(partition) => partition.len(),
            None => 0,
        }
    }

    /// Drop everything; returns how many entries were dropped.
    pub fn clear_all(&mut self) -> usize {
        let count = self.len();
        self.partitions.clear();
        count
    }

    /// Number of memoized sequences across all tags.
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.values().all(HashMap::is_empty)
    }
}

impl<T, K, V> Default for MemoStore<T, K, V>
where
    T: Copy + Eq + Hash + fmt::Debug,
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A memo store coupled with its stats and configuration: the read path.
pub(crate) struct Memo<T, K, V> {
    config: CacheConfig,
    store: MemoStore<T, K, V>,
    stats: CacheStats,
}

impl<T, K, V> Memo<T, K, V>
where
    T: Copy + Eq + Hash + fmt::Debug,
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: MemoStore::new(),
            stats: CacheStats::default(),
        }
    }

    /// Resolve one paged query.
    ///
    /// On a hit the memoized sequence is windowed directly. On a miss the
    /// `miss` closure computes the full, unwindowed result from the raw index;
    /// it is sorted (stably) if an ordering was requested, memoized, and then
    /// windowed. With caching disabled the store is bypassed entirely.
    pub fn lookup(
        &mut self,
        tag: T,
        filter: K,
        ordering: Option<&SortOrder<V>>,
        offset: i64,
        limit: i64,
        miss: impl FnOnce() -> Result<Vec<V>>,
    ) -> Result<Page<V>> {
        if !self.config.caching_enabled {
            let mut seq = miss()?;
            if let Some(order) = ordering {
                order.sort(&mut seq);
            }
            return Ok(Page::window(Arc::new(seq), offset, limit));
        }

        let key = ShapeKey::new(filter, ordering.map(SortOrder::id));

        if let Some(seq) = self.store.read(tag, &key) {
            debug!("cache hit: {:?}", tag);
            if self.config.collect_stats {
                self.stats.hits += 1;
            }
            return Ok(Page::window(seq, offset, limit));
        }

        debug!("cache miss: {:?}", tag);
        let mut seq = miss()?;
        if let Some(order) = ordering {
            order.sort(&mut seq);
        }
        let seq = self.store.store(tag, key, seq);
        if self.config.collect_stats {
            self.stats.misses += 1;
            self.stats.entries = self.store.len();
        }

        Ok(Page::window(seq, offset, limit))
    }

    /// Drop the given tag namespaces.
    pub fn clear_tags(&mut self, tags: &[T]) {
        let mut dropped = 0;
        for tag in tags {
            dropped += self.store.clear_tag(*tag);
        }
        self.account_cleared(dropped);
    }

    /// Drop every memoized sequence.
    pub fn clear_all(&mut self) {
        let dropped = self.store.clear_all();
        self.account_cleared(dropped);
    }

    fn account_cleared(&mut self, dropped: usize) {
        if dropped > 0 {
            debug!("invalidated {} cached sequences", dropped);
            if self.config.collect_stats {
                self.stats.invalidations += dropped as u64;
                self.stats.entries = self.store.len();
            }
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }
}
