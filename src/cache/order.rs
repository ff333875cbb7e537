//! Ordering identity for sorted queries
//!
//! A sorted query is cached under its ordering's identity: two different
//! orderings of the same parameters get independent cache entries, and the
//! same ordering reuses the already-sorted materialization. Sorting is stable,
//! so ties keep the raw index order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

type CompareFn<V> = dyn Fn(&V, &V) -> Ordering + Send + Sync;

/// Named comparator over result elements
#[derive(Clone)]
pub struct SortOrder<V> {
    id: String,
    cmp: Arc<CompareFn<V>>,
}

impl<V> SortOrder<V> {
    /// Create an ordering. The `id` is the cache-key identity: two orderings
    /// with the same id are treated as the same ordering.
    pub fn new(
        id: impl Into<String>,
        cmp: impl Fn(&V, &V) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            cmp: Arc::new(cmp),
        }
    }

    /// Order by a derived sort key.
    pub fn by_key<K, F>(id: impl Into<String>, key: F) -> Self
    where
        K: Ord,
        F: Fn(&V) -> K + Send + Sync + 'static,
    {
        Self::new(id, move |a, b| key(a).cmp(&key(b)))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn compare(&self, a: &V, b: &V) -> Ordering {
        (self.cmp)(a, b)
    }

    /// Stable sort of a full result sequence.
    pub fn sort(&self, seq: &mut [V]) {
        seq.sort_by(|a, b| (self.cmp)(a, b));
    }
}

impl<V> fmt::Debug for SortOrder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortOrder").field("id", &self.id).finish()
    }
}
