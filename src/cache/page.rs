//! Safe windowing over cached result sequences
//!
//! Every paged query resolves the full result once, then serves arbitrary
//! `(offset, limit)` windows from the cached sequence. [`Page`] is a read-only
//! view that shares the cached allocation instead of copying it.
//!
//! One quirk is preserved deliberately: an offset at or past the end of a
//! non-empty sequence starts the window at the *last* element rather than
//! producing an empty result. Callers of the original engine may depend on
//! it, so it is part of the contract and covered by tests.

use std::ops::Deref;
use std::sync::Arc;

/// Clamp `(offset, limit)` against a sequence of length `len`.
///
/// Rules:
/// - empty sequence or negative offset: start at `0`
/// - `offset >= len` (non-empty): start at `len - 1` (the preserved quirk)
/// - end is `offset + limit` clamped into `[0, len]`, and never below start
pub fn window_bounds(len: usize, offset: i64, limit: i64) -> (usize, usize) {
    let start = if len == 0 || offset < 0 {
        0
    } else if offset as usize >= len {
        len - 1
    } else {
        offset as usize
    };

    let end = offset
        .saturating_add(limit)
        .clamp(0, len as i64) as usize;

    (start, end.max(start))
}

/// Read-only window over a shared, fully materialized result sequence
#[derive(Debug, Clone)]
pub struct Page<V> {
    seq: Arc<Vec<V>>,
    start: usize,
    end: usize,
}

impl<V> Page<V> {
    /// Window `seq` by `(offset, limit)` without copying.
    pub fn window(seq: Arc<Vec<V>>, offset: i64, limit: i64) -> Self {
        let (start, end) = window_bounds(seq.len(), offset, limit);
        Self { seq, start, end }
    }

    /// The whole underlying sequence as a single page.
    pub fn all(seq: Arc<Vec<V>>) -> Self {
        let end = seq.len();
        Self { seq, start: 0, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_slice(&self) -> &[V] {
        &self.seq[self.start..self.end]
    }

    /// Length of the full cached result this page was cut from.
    pub fn total_len(&self) -> usize {
        self.seq.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.as_slice().iter()
    }
}

impl<V: Clone> Page<V> {
    pub fn to_vec(&self) -> Vec<V> {
        self.as_slice().to_vec()
    }
}

impl<V> Deref for Page<V> {
    type Target = [V];

    fn deref(&self) -> &[V] {
        self.as_slice()
    }
}

impl<'a, V> IntoIterator for &'a Page<V> {
    type Item = &'a V;
    type IntoIter = std::slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
