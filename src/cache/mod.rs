//! # Paged Index Caching Layer
//!
//! Building blocks shared by the five cache facades in [`crate::index`]:
//!
//! - **Safe Window** ([`page`]): clamped `(offset, limit)` windows over fully
//!   materialized result sequences, served as no-copy views
//! - **Memoization Store** ([`store`]): tag-partitioned query-shape map with
//!   whole-namespace invalidation and hit/miss accounting
//! - **Ordering identity** ([`order`]): named comparators that participate in
//!   the cache key, so differently sorted reads of the same query are cached
//!   independently
//! - **Invalidation table** ([`invalidation`]): the static event-to-namespace
//!   mapping consulted by each facade's event handler
//! - **Configuration** ([`config`]): memoization and stats toggles
//!
//! Entries have no TTL and no eviction policy of their own; their lifetime is
//! bounded by invalidation events and the owning facade's open/close cycle.

pub mod config;
pub mod invalidation;
pub mod order;
pub mod page;
pub mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use invalidation::Invalidation;
pub use order::SortOrder;
pub use page::{window_bounds, Page};
pub use store::{CacheStats, MemoStore, ShapeKey};

pub(crate) use store::Memo;
