//! Identity cache facade
//!
//! Serves the identity-locator axis: enumerating item identifiers, subject
//! identifiers and subject locators, and resolving constructs whose identity
//! locators match a pattern. The generic `Identifier` namespace aggregates all
//! three identity kinds, so every construct mutation that touches a specific
//! kind also drops the generic namespace.

use crate::cache::{CacheConfig, CacheStats, Invalidation, Memo, Page, SortOrder};
use crate::error::{IndexError, Result};
use crate::event::{
    ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource, TopicMapListener,
};
use crate::index::{read_lock, write_lock, Index};
use crate::model::{ConstructKind, ConstructRef, Locator};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Query-shape namespaces of the identity category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityTag {
    /// Any identity kind
    Identifier,
    ItemIdentifier,
    SubjectIdentifier,
    SubjectLocator,
}

/// Parameter shape of an identity query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityFilter {
    /// Enumerate every locator of the namespace
    All,

    /// Constructs whose locator matches a regular expression
    Pattern(String),
}

/// Raw, uncached identity index
pub trait IdentityIndex: Index {
    /// Every item identifier in the store.
    fn item_identifiers(&self) -> Result<Vec<Locator>>;

    /// Every subject identifier in the store.
    fn subject_identifiers(&self) -> Result<Vec<Locator>>;

    /// Every subject locator in the store.
    fn subject_locators(&self) -> Result<Vec<Locator>>;

    /// Constructs with any identity locator matching the pattern.
    fn constructs_by_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>>;

    /// Constructs with an item identifier matching the pattern.
    fn constructs_by_item_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>>;

    /// Topics with a subject identifier matching the pattern.
    fn topics_by_subject_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>>;

    /// Topics with a subject locator matching the pattern.
    fn topics_by_subject_locator_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>>;
}

/// Invalidation table of the identity category.
///
/// Topics carry all three identity kinds; other constructs only item
/// identifiers. The generic namespace aggregates all three, so it is cleared
/// on every construct addition or removal.
pub fn invalidation(kind: TopicMapEventKind, _notifier: ConstructKind) -> Invalidation<IdentityTag> {
    use IdentityTag as T;
    use Invalidation::{None, Tags};
    use TopicMapEventKind as E;

    match kind {
        E::TopicAdded | E::TopicRemoved => Tags(&[
            T::Identifier,
            T::ItemIdentifier,
            T::SubjectIdentifier,
            T::SubjectLocator,
        ]),
        E::AssociationAdded
        | E::AssociationRemoved
        | E::RoleAdded
        | E::RoleRemoved
        | E::NameAdded
        | E::NameRemoved
        | E::OccurrenceAdded
        | E::OccurrenceRemoved
        | E::VariantAdded
        | E::VariantRemoved => Tags(&[T::Identifier, T::ItemIdentifier]),
        _ => None,
    }
}

struct Inner {
    open: bool,
    subscription: Option<ListenerId>,
    locators: Memo<IdentityTag, IdentityFilter, Locator>,
    constructs: Memo<IdentityTag, IdentityFilter, ConstructRef>,
}

/// Paged, sorted, invalidation-aware cache over an [`IdentityIndex`]
pub struct IdentityCache<I> {
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
        debug!("identity invalidation for {}", event.kind);
        match action {
            Invalidation::Tags(tags) => {
                inner.locators.clear_tags(tags);
                inner.constructs.clear_tags(tags);
            }
            Invalidation::All => {
                inner.locators.clear_all();
                inner.constructs.clear_all();
            }
            Invalidation::None => {}
        }
    }
}

impl<I> IdentityCache<I>
where
    I: IdentityIndex + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn TopicMapEventSource>, raw: I, config: CacheConfig) -> Self {
        info!("initializing identity cache");
        Self {
            inner: Arc::new(RwLock::new(Inner {
                open: false,
                subscription: None,
                locators: Memo::new(config.clone()),
                constructs: Memo::new(config.clone()),
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
        debug!("identity cache opened");
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
        inner.locators = Memo::new(self.config.clone());
        inner.constructs = Memo::new(self.config.clone());
        debug!("identity cache closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        read_lock(&self.inner).open
    }

    pub fn stats(&self) -> CacheStats {
        let inner = read_lock(&self.inner);
        let mut stats = inner.locators.stats().clone();
        stats.merge(inner.constructs.stats());
        stats
    }

    /// Every item identifier, paged.
    pub fn item_identifiers(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<Locator>>,
    ) -> Result<Page<Locator>> {
        self.lookup_locators(IdentityTag::ItemIdentifier, ordering, offset, limit, |raw| {
            raw.item_identifiers()
        })
    }

    /// Every subject identifier, paged.
    pub fn subject_identifiers(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<Locator>>,
    ) -> Result<Page<Locator>> {
        self.lookup_locators(IdentityTag::SubjectIdentifier, ordering, offset, limit, |raw| {
            raw.subject_identifiers()
        })
    }

    /// Every subject locator, paged.
    pub fn subject_locators(
        &self,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<Locator>>,
    ) -> Result<Page<Locator>> {
        self.lookup_locators(IdentityTag::SubjectLocator, ordering, offset, limit, |raw| {
            raw.subject_locators()
        })
    }

    /// Constructs with any identity locator matching the pattern.
    pub fn constructs_by_identifier(
        &self,
        pattern: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(IdentityTag::Identifier, pattern, ordering, offset, limit, |raw, p| {
            raw.constructs_by_identifier_pattern(p)
        })
    }

    /// Constructs with an item identifier matching the pattern.
    pub fn constructs_by_item_identifier(
        &self,
        pattern: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            IdentityTag::ItemIdentifier,
            pattern,
            ordering,
            offset,
            limit,
            |raw, p| raw.constructs_by_item_identifier_pattern(p),
        )
    }

    /// Topics with a subject identifier matching the pattern.
    pub fn topics_by_subject_identifier(
        &self,
        pattern: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            IdentityTag::SubjectIdentifier,
            pattern,
            ordering,
            offset,
            limit,
            |raw, p| raw.topics_by_subject_identifier_pattern(p),
        )
    }

    /// Topics with a subject locator matching the pattern.
    pub fn topics_by_subject_locator(
        &self,
        pattern: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup_constructs(
            IdentityTag::SubjectLocator,
            pattern,
            ordering,
            offset,
            limit,
            |raw, p| raw.topics_by_subject_locator_pattern(p),
        )
    }

    fn lookup_locators(
        &self,
        tag: IdentityTag,
        ordering: Option<&SortOrder<Locator>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I) -> Result<Vec<Locator>>,
    ) -> Result<Page<Locator>> {
        let raw = read_lock(&self.raw);
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Err(IndexError::Closed);
        }
        inner
            .locators
            .lookup(tag, IdentityFilter::All, ordering, offset, limit, || query(&raw))
    }

    fn lookup_constructs(
        &self,
        tag: IdentityTag,
        pattern: &str,
        ordering: Option<&SortOrder<ConstructRef>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &str) -> Result<Vec<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        let raw = read_lock(&self.raw);
        let mut inner = write_lock(&self.inner);
        if !inner.open {
            return Err(IndexError::Closed);
        }
        inner.constructs.lookup(
            tag,
            IdentityFilter::Pattern(pattern.to_string()),
            ordering,
            offset,
            limit,
            || query(&raw, pattern),
        )
    }
}
