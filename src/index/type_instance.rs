//! Type-instance cache facade
//!
//! Serves the typing axis: which constructs are instances of a type, and
//! which topics are used as types of each construct kind. Collection queries
//! carry an `all` flag: a topic matches a reference set either by having
//! every reference among its types (`all = true`, superset) or at least one
//! (`all = false`, intersection). The flag is part of the cache key, so
//! the two result sets are cached independently.

use crate::cache::{CacheConfig, CacheStats, Invalidation, Memo, Page, SortOrder};
use crate::error::{IndexError, Result};
use crate::event::{
    ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource, TopicMapListener,
};
use crate::index::{read_lock, write_lock, Index};
use crate::model::{ConstructKind, ConstructRef};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Query-shape namespaces of the type-instance category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeInstanceTag {
    Association,
    Characteristics,
    Name,
    Occurrence,
    Role,
    Topic,
    /// Collection-of-types queries with `all = true`
    TopicMatchingAll,
    Variant,
}

/// Parameter shape of a type-instance query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeFilter {
    /// The distinct types in use on the axis
    Types,

    /// Instances of one type; `None` selects untyped constructs
    Instances(Option<ConstructRef>),

    /// Instances matching a set of types, by superset (`all`) or intersection
    Matching {
        types: Vec<ConstructRef>,
        all: bool,
    },
}

impl TypeFilter {
    /// Canonicalize a collection filter so equal reference sets share one
    /// cache entry regardless of input order.
    pub fn matching(types: &[ConstructRef], all: bool) -> Self {
        let mut types = types.to_vec();
        types.sort_unstable();
        types.dedup();
        TypeFilter::Matching { types, all }
    }
}

/// Raw, uncached type-instance index: one method per namespace, always
/// returning the full, unwindowed result.
pub trait TypeInstanceIndex: Index {
    fn associations(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn characteristics(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn names(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn occurrences(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn roles(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn topics(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
    fn variants(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>>;
}

/// Invalidation table of the type-instance category.
///
/// Cascades: names carry variants, so name mutations also drop variant-keyed
/// shapes; associations carry roles; a removed topic may appear in any shape
/// (as type, instance or player), so topic removal clears the category.
pub fn invalidation(
    kind: TopicMapEventKind,
    notifier: ConstructKind,
) -> Invalidation<TypeInstanceTag> {
    use Invalidation::{All, None, Tags};
    use TopicMapEventKind as E;
    use TypeInstanceTag as T;

    match kind {
        E::TopicRemoved => All,
        E::TopicAdded => Tags(&[T::Topic, T::TopicMatchingAll]),
        E::AssociationAdded | E::AssociationRemoved => Tags(&[T::Association, T::Role]),
        E::RoleAdded | E::RoleRemoved | E::PlayerModified => Tags(&[T::Role]),
        E::NameAdded | E::NameRemoved => Tags(&[T::Name, T::Characteristics, T::Variant]),
        E::OccurrenceAdded | E::OccurrenceRemoved => Tags(&[T::Occurrence, T::Characteristics]),
        E::VariantAdded | E::VariantRemoved => Tags(&[T::Variant]),
        E::TypeAdded | E::TypeRemoved => match notifier {
            ConstructKind::Topic => Tags(&[T::Topic, T::TopicMatchingAll]),
            ConstructKind::Association => Tags(&[T::Association]),
            ConstructKind::Role => Tags(&[T::Role]),
            ConstructKind::Name => Tags(&[T::Name, T::Characteristics]),
            ConstructKind::Occurrence => Tags(&[T::Occurrence, T::Characteristics]),
            ConstructKind::Variant => Tags(&[T::Variant]),
        },
        _ => None,
    }
}

struct Inner {
    open: bool,
    subscription: Option<ListenerId>,
    constructs: Memo<TypeInstanceTag, TypeFilter, ConstructRef>,
}

/// Paged, sorted, invalidation-aware cache over a [`TypeInstanceIndex`]
pub struct TypeInstanceCache<I> {
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
        debug!("type-instance invalidation for {}", event.kind);
        match action {
            Invalidation::Tags(tags) => inner.constructs.clear_tags(tags),
            Invalidation::All => inner.constructs.clear_all(),
            Invalidation::None => {}
        }
    }
}

impl<I> TypeInstanceCache<I>
where
    I: TypeInstanceIndex + Send + Sync + 'static,
{
    /// Create a facade bound to one store's event stream and one raw index.
    pub fn new(source: Arc<dyn TopicMapEventSource>, raw: I, config: CacheConfig) -> Self {
        info!("initializing type-instance cache");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                open: false,
                subscription: None,
                constructs: Memo::new(config.clone()),
            })),
            config,
            source,
            raw: RwLock::new(raw),
        }
    }

    /// Open the facade: ensure the raw index is open, then subscribe to the
    /// mutation-event stream. Idempotent.
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
        debug!("type-instance cache opened");
        Ok(())
    }

    /// Close the facade: unsubscribe and discard every cached result. A later
    /// [`open`](Self::open) starts from an empty cache. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Ok(());
        }
        if let Some(id) = inner.subscription.take() {
            self.source.unsubscribe(id);
        }
        inner.open = false;
        inner.constructs = Memo::new(self.config.clone());
        debug!("type-instance cache closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        read_lock(&self.inner).open
    }

    pub fn stats(&self) -> CacheStats {
        read_lock(&self.inner).constructs.stats().clone()
    }

    /// Topics used as association type.
    pub fn association_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(TypeInstanceTag::Association, TypeFilter::Types, ordering, offset, limit, |raw, f| {
            raw.associations(f)
        })
    }

    /// Associations of the given type.
    pub fn associations_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Association,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.associations(f),
        )
    }

    /// Topics used as name or occurrence type.
    pub fn characteristic_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Characteristics,
            TypeFilter::Types,
            ordering,
            offset,
            limit,
            |raw, f| raw.characteristics(f),
        )
    }

    /// Names and occurrences of the given type.
    pub fn characteristics_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Characteristics,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.characteristics(f),
        )
    }

    /// Topics used as name type.
    pub fn name_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(TypeInstanceTag::Name, TypeFilter::Types, ordering, offset, limit, |raw, f| {
            raw.names(f)
        })
    }

    /// Names of the given type.
    pub fn names_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Name,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.names(f),
        )
    }

    /// Topics used as occurrence type.
    pub fn occurrence_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Occurrence,
            TypeFilter::Types,
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    /// Occurrences of the given type.
    pub fn occurrences_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Occurrence,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    /// Topics used as role type.
    pub fn role_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(TypeInstanceTag::Role, TypeFilter::Types, ordering, offset, limit, |raw, f| {
            raw.roles(f)
        })
    }

    /// Roles of the given type.
    pub fn roles_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Role,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.roles(f),
        )
    }

    /// Topics used as topic type.
    pub fn topic_types(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(TypeInstanceTag::Topic, TypeFilter::Types, ordering, offset, limit, |raw, f| {
            raw.topics(f)
        })
    }

    /// Instances of one topic type; `None` selects unclassified topics.
    pub fn topics_by_type(
        &self,
        ty: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Topic,
            TypeFilter::Instances(ty),
            ordering,
            offset,
            limit,
            |raw, f| raw.topics(f),
        )
    }

    /// Topics matching a set of types. `all = true` requires every type
    /// (superset match) and is keyed under its own namespace.
    pub fn topics_by_types(
        &self,
        types: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let tag = if all {
            TypeInstanceTag::TopicMatchingAll
        } else {
            TypeInstanceTag::Topic
        };
        self.lookup(tag, TypeFilter::matching(types, all), ordering, offset, limit, |raw, f| {
            raw.topics(f)
        })
    }

    /// Variants of the given type.
    pub fn variants_by_type(
        &self,
        ty: ConstructRef,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            TypeInstanceTag::Variant,
            TypeFilter::Instances(Some(ty)),
            ordering,
            offset,
            limit,
            |raw, f| raw.variants(f),
        )
    }

    fn lookup(
        &self,
        tag: TypeInstanceTag,
        filter: TypeFilter,
        ordering: Option<&SortOrder<ConstructRef>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &TypeFilter) -> Result<Vec<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let raw = read_lock(&self.raw);
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Err(IndexError::Closed);
        }
        inner
            .constructs
            .lookup(tag, filter.clone(), ordering, offset, limit, || {
                query(&raw, &filter)
            })
    }
}
