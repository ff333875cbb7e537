//! Scope cache facade
//!
//! Serves the scope axis: which scopes and themes are in use per statement
//! kind, and which scoped constructs carry a theme, a theme set, a concrete
//! scope, or one of several scopes. Scopes are keyed by object identity, not
//! by theme-set equality. Names surface as characteristics, so name scope
//! mutations also drop variant- and characteristics-keyed shapes.

use crate::cache::{CacheConfig, CacheStats, Invalidation, Memo, Page, SortOrder};
use crate::error::{IndexError, Result};
use crate::event::{
    ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource, TopicMapListener,
};
use crate::index::{read_lock, write_lock, Index};
use crate::model::{ConstructKind, ConstructRef, ScopeId};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Query-shape namespaces of the scope category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopedTag {
    /// Cross-kind queries (scope discovery, any scoped construct)
    Scoped,
    Association,
    Occurrence,
    Name,
    Variant,
    Characteristics,
}

/// Parameter shape of a scope query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeFilter {
    /// Every scope in use on the axis
    Scopes,

    /// Every theme in use on the axis
    Themes,

    /// Constructs carrying one theme; `None` selects unscoped constructs
    Theme(Option<ConstructRef>),

    /// Constructs matching a theme set, by superset (`all`) or intersection
    ThemesMatching {
        themes: Vec<ConstructRef>,
        all: bool,
    },

    /// Constructs scoped by exactly this scope object
    Scope(ScopeId),

    /// Constructs scoped by any of these scope objects
    InScopes(Vec<ScopeId>),
}

impl ScopeFilter {
    /// Canonicalize a theme-set filter.
    pub fn themes_matching(themes: &[ConstructRef], all: bool) -> Self {
        let mut themes = themes.to_vec();
        themes.sort_unstable();
        themes.dedup();
        ScopeFilter::ThemesMatching { themes, all }
    }

    /// Canonicalize a scope-set filter.
    pub fn in_scopes(scopes: &[ScopeId]) -> Self {
        let mut scopes = scopes.to_vec();
        scopes.sort_unstable();
        scopes.dedup();
        ScopeFilter::InScopes(scopes)
    }
}

/// Raw, uncached scope index
pub trait ScopedIndex: Index {
    fn association_scopes(&self) -> Result<Vec<ScopeId>>;
    fn association_themes(&self) -> Result<Vec<ConstructRef>>;
    fn associations(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;

    fn occurrence_scopes(&self) -> Result<Vec<ScopeId>>;
    fn occurrence_themes(&self) -> Result<Vec<ConstructRef>>;
    fn occurrences(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;

    fn name_scopes(&self) -> Result<Vec<ScopeId>>;
    fn name_themes(&self) -> Result<Vec<ConstructRef>>;
    fn names(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;

    fn variant_scopes(&self) -> Result<Vec<ScopeId>>;
    fn variant_themes(&self) -> Result<Vec<ConstructRef>>;
    fn variants(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;

    /// Scope objects matching a theme-set filter.
    fn scopes(&self, filter: &ScopeFilter) -> Result<Vec<ScopeId>>;

    /// Scoped constructs of any kind matching the filter.
    fn scopables(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;

    /// Names and occurrences matching the filter.
    fn characteristics(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>>;
}

/// Invalidation table of the scope category.
pub fn invalidation(kind: TopicMapEventKind, notifier: ConstructKind) -> Invalidation<ScopedTag> {
    use Invalidation::{All, None, Tags};
    use ScopedTag as T;
    use TopicMapEventKind as E;

    match kind {
        // A removed topic may have been a theme anywhere
        E::TopicRemoved => All,
        E::AssociationAdded | E::AssociationRemoved => Tags(&[T::Association, T::Scoped]),
        E::NameAdded | E::NameRemoved => {
            Tags(&[T::Name, T::Variant, T::Characteristics, T::Scoped])
        }
        E::OccurrenceAdded | E::OccurrenceRemoved => {
            Tags(&[T::Occurrence, T::Characteristics, T::Scoped])
        }
        E::VariantAdded | E::VariantRemoved => Tags(&[T::Variant, T::Scoped]),
        E::ScopeModified => match notifier {
            ConstructKind::Association => Tags(&[T::Association, T::Scoped]),
            ConstructKind::Name => Tags(&[T::Name, T::Variant, T::Characteristics, T::Scoped]),
            ConstructKind::Occurrence => Tags(&[T::Occurrence, T::Characteristics, T::Scoped]),
            ConstructKind::Variant => Tags(&[T::Variant, T::Scoped]),
            // Topics and roles are not scoped
            ConstructKind::Topic | ConstructKind::Role => None,
        },
        _ => None,
    }
}

struct Inner {
    open: bool,
    subscription: Option<ListenerId>,
    constructs: Memo<ScopedTag, ScopeFilter, ConstructRef>,
    scopes: Memo<ScopedTag, ScopeFilter, ScopeId>,
}

/// Paged, sorted, invalidation-aware cache over a [`ScopedIndex`]
pub struct ScopedCache<I> {
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
        debug!("scope invalidation for {}", event.kind);
        match action {
            Invalidation::Tags(tags) => {
                inner.constructs.clear_tags(tags);
                inner.scopes.clear_tags(tags);
            }
            Invalidation::All => {
                inner.constructs.clear_all();
                inner.scopes.clear_all();
            }
            Invalidation::None => {}
        }
    }
}

impl<I> ScopedCache<I>
where
    I: ScopedIndex + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn TopicMapEventSource>, raw: I, config: CacheConfig) -> Self {
        info!("initializing scope cache");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                open: false,
                subscription: None,
                constructs: Memo::new(config.clone()),
                scopes: Memo::new(config.clone()),
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
        debug!("scope cache opened");
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
        inner.constructs = Memo::new(self.config.clone());
        inner.scopes = Memo::new(self.config.clone());
        debug!("scope cache closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        read_lock(&self.inner).open
    }

    pub fn stats(&self) -> CacheStats {
        let inner = read_lock(&self.inner);
        let mut stats = inner.constructs.stats().clone();
        stats.merge(inner.scopes.stats());
        stats
    }

    /// Scope objects matching a theme set.
    pub fn scopes_by_themes(
        &self,
        themes: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        self.lookup_scopes(
            ScopedTag::Scoped,
            ScopeFilter::themes_matching(themes, all),
            ordering,
            offset,
            limit,
            |raw, f| raw.scopes(f),
        )
    }

    /// Every scoped construct carrying the scope.
    pub fn scopables_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Scoped,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.scopables(f),
        )
    }

    /// Names and occurrences carrying the scope.
    pub fn characteristics_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Characteristics,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.characteristics(f),
        )
    }

    // Association axis

    pub fn association_scopes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        self.lookup_scopes(ScopedTag::Association, ScopeFilter::Scopes, ordering, offset, limit, |raw, _| {
            raw.association_scopes()
        })
    }

    pub fn association_themes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(ScopedTag::Association, ScopeFilter::Themes, ordering, offset, limit, |raw, _| {
            raw.association_themes()
        })
    }

    /// Associations carrying the theme; `None` selects unscoped associations.
    pub fn associations_by_theme(
        &self,
        theme: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Association,
            ScopeFilter::Theme(theme),
            ordering,
            offset,
            limit,
            |raw, f| raw.associations(f),
        )
    }

    pub fn associations_by_themes(
        &self,
        themes: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Association,
            ScopeFilter::themes_matching(themes, all),
            ordering,
            offset,
            limit,
            |raw, f| raw.associations(f),
        )
    }

    pub fn associations_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Association,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.associations(f),
        )
    }

    pub fn associations_by_scopes(
        &self,
        scopes: &[ScopeId],
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Association,
            ScopeFilter::in_scopes(scopes),
            ordering,
            offset,
            limit,
            |raw, f| raw.associations(f),
        )
    }

    // Occurrence axis

    pub fn occurrence_scopes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        self.lookup_scopes(ScopedTag::Occurrence, ScopeFilter::Scopes, ordering, offset, limit, |raw, _| {
            raw.occurrence_scopes()
        })
    }

    pub fn occurrence_themes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(ScopedTag::Occurrence, ScopeFilter::Themes, ordering, offset, limit, |raw, _| {
            raw.occurrence_themes()
        })
    }

    pub fn occurrences_by_theme(
        &self,
        theme: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Occurrence,
            ScopeFilter::Theme(theme),
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    pub fn occurrences_by_themes(
        &self,
        themes: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Occurrence,
            ScopeFilter::themes_matching(themes, all),
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    pub fn occurrences_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Occurrence,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    pub fn occurrences_by_scopes(
        &self,
        scopes: &[ScopeId],
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Occurrence,
            ScopeFilter::in_scopes(scopes),
            ordering,
            offset,
            limit,
            |raw, f| raw.occurrences(f),
        )
    }

    // Name axis

    pub fn name_scopes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        self.lookup_scopes(ScopedTag::Name, ScopeFilter::Scopes, ordering, offset, limit, |raw, _| {
            raw.name_scopes()
        })
    }

    pub fn name_themes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(ScopedTag::Name, ScopeFilter::Themes, ordering, offset, limit, |raw, _| {
            raw.name_themes()
        })
    }

    pub fn names_by_theme(
        &self,
        theme: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Name,
            ScopeFilter::Theme(theme),
            ordering,
            offset,
            limit,
            |raw, f| raw.names(f),
        )
    }

    pub fn names_by_themes(
        &self,
        themes: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Name,
            ScopeFilter::themes_matching(themes, all),
            ordering,
            offset,
            limit,
            |raw, f| raw.names(f),
        )
    }

    pub fn names_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Name,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.names(f),
        )
    }

    pub fn names_by_scopes(
        &self,
        scopes: &[ScopeId],
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Name,
            ScopeFilter::in_scopes(scopes),
            ordering,
            offset,
            limit,
            |raw, f| raw.names(f),
        )
    }

    // Variant axis

    pub fn variant_scopes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        self.lookup_scopes(ScopedTag::Variant, ScopeFilter::Scopes, ordering, offset, limit, |raw, _| {
            raw.variant_scopes()
        })
    }

    pub fn variant_themes(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(ScopedTag::Variant, ScopeFilter::Themes, ordering, offset, limit, |raw, _| {
            raw.variant_themes()
        })
    }

    pub fn variants_by_theme(
        &self,
        theme: Option<ConstructRef>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Variant,
            ScopeFilter::Theme(theme),
            ordering,
            offset,
            limit,
            |raw, f| raw.variants(f),
        )
    }

    pub fn variants_by_themes(
        &self,
        themes: &[ConstructRef],
        all: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Variant,
            ScopeFilter::themes_matching(themes, all),
            ordering,
            offset,
            limit,
            |raw, f| raw.variants(f),
        )
    }

    pub fn variants_by_scope(
        &self,
        scope: ScopeId,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Variant,
            ScopeFilter::Scope(scope),
            ordering,
            offset,
            limit,
            |raw, f| raw.variants(f),
        )
    }

    pub fn variants_by_scopes(
        &self,
        scopes: &[ScopeId],
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            ScopedTag::Variant,
            ScopeFilter::in_scopes(scopes),
            ordering,
            offset,
            limit,
            |raw, f| raw.variants(f),
        )
    }

    fn lookup_constructs(
        &self,
        tag: ScopedTag,
        filter: ScopeFilter,
        ordering: Option<&SortOrder<ConstructRef>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &ScopeFilter) -> Result<Vec<ConstructRef>>,
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

    fn lookup_scopes(
        &self,
        tag: ScopedTag,
        filter: ScopeFilter,
        ordering: Option<&SortOrder<ScopeId>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &ScopeFilter) -> Result<Vec<ScopeId>>,
    ) -> Result<Page<ScopeId>> {
        let raw = read_lock(&self.raw);
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Err(IndexError::Closed);
        }
        inner
            .scopes
            .lookup(tag, filter.clone(), ordering, offset, limit, || {
                query(&raw, &filter)
            })
    }
}
