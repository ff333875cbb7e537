//! Supertype-subtype cache facade
//!
//! Serves the type-hierarchy axis: transitive and direct supertypes and
//! subtypes. Because the transitive queries are reachability closures,
//! partial invalidation is unsound (neither endpoint of a changed edge
//! bounds which cached closures grew or shrank), so any hierarchy mutation
//! and any topic removal clears the whole category.

use crate::cache::{CacheConfig, CacheStats, Invalidation, Memo, Page, SortOrder};
use crate::error::{IndexError, Result};
use crate::event::{
    ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource, TopicMapListener,
};
use crate::index::{read_lock, write_lock, Index};
use crate::model::{ConstructKind, ConstructRef};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Query-shape namespaces of the supertype-subtype category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupertypeSubtypeTag {
    Supertype,
    /// Collection queries with `all = true`
    SupertypeAll,
    Subtype,
    SubtypeAll,
    DirectSupertype,
    DirectSubtype,
}

/// Parameter shape of a hierarchy query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HierarchyFilter {
    /// Every super/subtype in the map
    Global,

    /// Super/subtypes of one topic; `None` selects topics with no
    /// super/subtype at all
    Of(Option<ConstructRef>),

    /// Topics matching a set of reference types, by superset (`all`) or
    /// intersection of their super/subtype closure
    Matching {
        types: Vec<ConstructRef>,
        all: bool,
    },
}

impl HierarchyFilter {
    /// Canonicalize a collection filter.
    pub fn matching(types: &[ConstructRef], all: bool) -> Self {
        let mut types = types.to_vec();
        types.sort_unstable();
        types.dedup();
        HierarchyFilter::Matching { types, all }
    }
}

/// Raw, uncached supertype-subtype index. Transitive methods answer over the
/// full closure, direct methods over one hop.
pub trait SupertypeSubtypeIndex: Index {
    fn supertypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>>;
    fn subtypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>>;
    fn direct_supertypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>>;
    fn direct_subtypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>>;
}

/// Invalidation table of the supertype-subtype category.
pub fn invalidation(
    kind: TopicMapEventKind,
    _notifier: ConstructKind,
) -> Invalidation<SupertypeSubtypeTag> {
    use Invalidation::{All, None};
    use TopicMapEventKind as E;

    match kind {
        E::SupertypeAdded | E::SupertypeRemoved | E::TopicRemoved => All,
        _ => None,
    }
}

struct Inner {
    open: bool,
    subscription: Option<ListenerId>,
    topics: Memo<SupertypeSubtypeTag, HierarchyFilter, ConstructRef>,
}

/// Paged, sorted, invalidation-aware cache over a [`SupertypeSubtypeIndex`]
pub struct SupertypeSubtypeCache<I> {
    config: CacheConfig,
    source: Arc<dyn TopicMapEventSource>,
    raw: RwLock<I>,
    inner: Arc<RwLock<Inner>>,
}

/// Listener registered while the facade is open; shares the facade's state.
struct Invalidator {
    inner: Arc<RwLock<Inner>>,
}

impl TopicMapListener for Invalidator {
    fn on_event(&self, event: &TopicMapEvent) {
        let action = invalidation(event.kind, event.notifier.kind);
        if action.is_none() {
            return;
        }
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return;
        }
        debug!("supertype-subtype invalidation for {}", event.kind);
        match action {
            Invalidation::Tags(tags) => inner.topics.clear_tags(tags),
            Invalidation::All => inner.topics.clear_all(),
            Invalidation::None => {}
        }
    }
}

impl<I> SupertypeSubtypeCache<I>
where
    I: SupertypeSubtypeIndex + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn TopicMapEventSource>, raw: I, config: CacheConfig) -> Self {
        info!("initializing supertype-subtype cache");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                open: false,
                subscription: None,
                topics: Memo::new(config.clone()),
            })),
            config,
            source,
            raw: RwLock::new(raw),
        }
    }

    pub fn open(&self) -> Result<()> {
        {
            let mut raw = write_lock(&self.raw);
            if !raw.is_open() {
                raw.open()?;
            }
        }
        let mut inner = write_lock(&self.inner);
        if inner.open {
            return Ok(());
        }
        inner.open = true;
        let listener = Arc::new(Invalidator {
            inner: Arc::clone(&self.inner),
        });
        inner.subscription = Some(self.source.subscribe(listener));
        debug!("supertype-subtype cache opened");
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Ok(());
        }
        if let Some(id) = inner.subscription.take() {
            self.source.unsubscribe(id);
        }
        inner.open = false;
        inner.topics = Memo::new(self.config.clone());
        debug!("supertype-subtype cache closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        read_lock(&self.inner).open
    }

    pub fn stats(&self) -> CacheStats {
        read_lock(&self.inner).topics.stats().clone()
    }

    /// Every topic acting as a supertype.
    pub fn supertypes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::Supertype,
            HierarchyFilter::Global,
            ordering,
            offset,
            limit,
            |raw, f| raw.supertypes(f),
        )
    }

    /// Transitive supertypes of one topic; `None` selects topics with no
    /// supertype.
    pub fn supertypes_of(
        &self,
        topic: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::Supertype,
            HierarchyFilter::Of(topic),
            ordering,
            offset,
            limit,
            |raw, f| raw.supertypes(f),
        )
    }

    /// Topics whose supertype closure matches the reference set.
    pub fn supertypes_of_all(
        &self,
        types: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let tag = if all {
            SupertypeSubtypeTag::SupertypeAll
        } else {
            SupertypeSubtypeTag::Supertype
        };
        self.lookup(tag, HierarchyFilter::matching(types, all), ordering, offset, limit, |raw, f| {
            raw.supertypes(f)
        })
    }

    /// One-hop supertypes of one topic.
    pub fn direct_supertypes_of(
        &self,
        topic: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::DirectSupertype,
            HierarchyFilter::Of(Some(topic)),
            ordering,
            offset,
            limit,
            |raw, f| raw.direct_supertypes(f),
        )
    }

    /// Every topic acting as a subtype.
    pub fn subtypes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::Subtype,
            HierarchyFilter::Global,
            ordering,
            offset,
            limit,
            |raw, f| raw.subtypes(f),
        )
    }

    /// Transitive subtypes of one topic; `None` selects topics with no
    /// subtype.
    pub fn subtypes_of(
        &self,
        topic: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::Subtype,
            HierarchyFilter::Of(topic),
            ordering,
            offset,
            limit,
            |raw, f| raw.subtypes(f),
        )
    }

    /// Topics whose subtype closure matches the reference set.
    pub fn subtypes_of_all(
        &self,
        types: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let tag = if all {
            SupertypeSubtypeTag::SubtypeAll
        } else {
            SupertypeSubtypeTag::Subtype
        };
        self.lookup(tag, HierarchyFilter::matching(types, all), ordering, offset, limit, |raw, f| {
            raw.subtypes(f)
        })
    }

    /// One-hop subtypes of one topic.
    pub fn direct_subtypes_of(
        &self,
        topic: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            SupertypeSubtypeTag::DirectSubtype,
            HierarchyFilter::Of(Some(topic)),
            ordering,
            offset,
            limit,
            |raw, f| raw.direct_subtypes(f),
        )
    }

    fn lookup(
        &self,
        tag: SupertypeSubtypeTag,
        filter: HierarchyFilter,
        ordering: Option<&SortOrder<ConstructRef>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &HierarchyFilter) -> Result<Vec<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let raw = read_lock(&self.raw);
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Err(IndexError::Closed);
        }
        inner
            .topics
            .lookup(tag, filter.clone(), ordering, offset, limit, || {
                query(&raw, &filter)
            })
    }
}
