//! # Topic Maps Index Caching (topicmap-index)
//!
//! Paged, sorted, invalidation-aware caches over the query indexes of a Topic
//! Maps graph engine.
//!
//! ## Features
//!
//! - Five cache facades, one per query axis: type-instance, identity,
//!   literal, scope, and supertype-subtype
//! - Full-result memoization per query shape: any `(offset, limit)` window
//!   and any named ordering of the same query share one materialization
//! - No-copy paged views over cached sequences
//! - Event-driven invalidation from the store's mutation stream, with the
//!   cross-axis cascades the domain requires (names carry variants,
//!   associations carry roles, names surface as characteristics)
//! - Static, data-driven invalidation tables, testable row by row
//! - Open/close lifecycle bounding every cached entry's lifetime
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use topicmap_index::{
//!     CacheConfig, ConstructRef, EventBus, SortOrder, TypeInstanceCache,
//! };
//! # use topicmap_index::{Result, Index, TypeFilter, TypeInstanceIndex};
//! # struct RawIndex;
//! # impl Index for RawIndex {
//! #     fn open(&mut self) -> Result<()> { Ok(()) }
//! #     fn close(&mut self) -> Result<()> { Ok(()) }
//! #     fn is_open(&self) -> bool { true }
//! # }
//! # impl TypeInstanceIndex for RawIndex {
//! #     fn associations(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn characteristics(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn names(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn occurrences(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn roles(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn topics(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! #     fn variants(&self, _: &TypeFilter) -> Result<Vec<ConstructRef>> { Ok(vec![]) }
//! # }
//!
//! fn main() -> topicmap_index::Result<()> {
//!     let events = Arc::new(EventBus::new());
//!     let cache = TypeInstanceCache::new(events.clone(), RawIndex, CacheConfig::default());
//!     cache.open()?;
//!
//!     // First read materializes the full result; later windows are served
//!     // from the cache.
//!     let by_id = SortOrder::by_key("by_id", |c: &ConstructRef| c.id);
//!     let page = cache.topic_types(0, 20, Some(&by_id))?;
//!     println!("{} of {} topic types", page.len(), page.total_len());
//!
//!     cache.close()?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod error;
pub mod event;
pub mod index;
pub mod model;

// Re-export main types for convenience
pub use cache::{
    window_bounds, CacheConfig, CacheConfigBuilder, CacheStats, Invalidation, MemoStore, Page,
    ShapeKey, SortOrder,
};
pub use error::{IndexError, Result};
pub use event::{
    EventBus, EventValue, ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource,
    TopicMapListener,
};
pub use index::{
    HierarchyFilter, IdentityCache, IdentityFilter, IdentityIndex, IdentityTag, Index,
    LiteralCache, LiteralFilter, LiteralIndex, LiteralTag, ScopeFilter, ScopedCache, ScopedIndex,
    ScopedTag, SupertypeSubtypeCache, SupertypeSubtypeIndex, SupertypeSubtypeTag, TypeFilter,
    TypeInstanceCache, TypeInstanceIndex, TypeInstanceTag,
};
pub use model::{
    ConstructKind, ConstructRef, Deviance, LiteralValue, Locator, ScopeId, Wgs84Coordinate,
};
