//! Cache facades, one per index category
//!
//! Each facade wraps a raw, uncached index behind the same query surface plus
//! paging, optional ordering, and memoization. Data flows one way on a miss:
//! caller → facade → raw index → memo store → window → caller. While a facade
//! is open it is subscribed to the store's mutation-event stream and clears
//! exactly the memoized namespaces its invalidation table maps each event to.
//!
//! Facades provide correctness under serialized access, not thread-safety:
//! the store delivers events serially, and the read path is assumed not to
//! race the event handler. The interior locks exist because the cached state
//! is shared with the listener registered on the event stream.

pub mod identity;
pub mod literal;
pub mod scoped;
pub mod supertype_subtype;
pub mod type_instance;

use crate::error::Result;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use identity::{IdentityCache, IdentityFilter, IdentityIndex, IdentityTag};
pub use literal::{LiteralCache, LiteralFilter, LiteralIndex, LiteralTag};
pub use scoped::{ScopeFilter, ScopedCache, ScopedIndex, ScopedTag};
pub use supertype_subtype::{
    HierarchyFilter, SupertypeSubtypeCache, SupertypeSubtypeIndex, SupertypeSubtypeTag,
};
pub use type_instance::{TypeFilter, TypeInstanceCache, TypeInstanceIndex, TypeInstanceTag};

/// Lifecycle shared by raw indexes and cache facades
pub trait Index {
    /// Bring the index into the open state. Opening an open index is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Leave the open state. Closing a closed index is a no-op.
    fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Read-lock that survives poisoning; the serialized-access model means a
/// poisoned lock still guards consistent data.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
