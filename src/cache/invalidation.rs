//! Invalidation table value type
//!
//! Each cache category maps a mutation-event kind (refined, where the kind is
//! ambiguous, by the notifier's runtime kind) to the set of tag namespaces to
//! clear in full. The mapping is a static table consulted in O(1), not
//! per-event control flow, which makes every table row directly testable as
//! data. Invalidation is coarse by design: a matched tag is cleared whole, and
//! when in doubt a category clears more rather than less.

/// What one event means for one cache category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation<T: 'static> {
    /// The event cannot affect this category
    None,

    /// Clear these tag namespaces in full
    Tags(&'static [T]),

    /// Clear the whole category
    All,
}

impl<T> Invalidation<T> {
    pub fn is_none(&self) -> bool {
        matches!(self, Invalidation::None)
    }
}
