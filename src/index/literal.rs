//! Literal cache facade
//!
//! Serves the literal-value axis: names, occurrences and variants looked up
//! by exact value, by value and datatype, by a range around a value (numeric,
//! temporal or geographic deviance), by regular expression, or by datatype
//! alone. The value-typed namespaces are not separated by owning construct
//! kind internally, so any value-bearing mutation invalidates all of them
//! (preserved broad invalidation; a narrower mapping is not provably sound).

use crate::cache::{CacheConfig, CacheStats, Invalidation, Memo, Page, SortOrder};
use crate::error::{IndexError, Result};
use crate::event::{
    ListenerId, TopicMapEvent, TopicMapEventKind, TopicMapEventSource, TopicMapListener,
};
use crate::index::{read_lock, write_lock, Index};
use crate::model::{ConstructKind, ConstructRef, Deviance, LiteralValue, Locator, Wgs84Coordinate};
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Query-shape namespaces of the literal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralTag {
    Boolean,
    String,
    Integer,
    Long,
    Float,
    Double,
    DateTime,
    Uri,
    Coordinates,
    Datatype,
    Regexp,
    DatatypeAware,
    Characteristics,
}

/// Every namespace a value-bearing mutation can affect
const ALL_TAGS: &[LiteralTag] = &[
    LiteralTag::Boolean,
    LiteralTag::String,
    LiteralTag::Integer,
    LiteralTag::Long,
    LiteralTag::Float,
    LiteralTag::Double,
    LiteralTag::DateTime,
    LiteralTag::Uri,
    LiteralTag::Coordinates,
    LiteralTag::Datatype,
    LiteralTag::Regexp,
    LiteralTag::DatatypeAware,
    LiteralTag::Characteristics,
];

/// Parameter shape of a literal query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralFilter {
    /// Exact value match
    Value(LiteralValue),

    /// Lexical value constrained to a datatype
    ValueWithDatatype(String, Locator),

    /// Values within a deviance of a reference value
    About(LiteralValue, Deviance),

    /// Lexical values matching a regular expression
    Pattern(String),

    /// Every literal of a datatype
    Datatype(Locator),
}

/// Raw, uncached literal index: one method per namespace.
pub trait LiteralIndex: Index {
    fn characteristics(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn booleans(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn strings(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn integers(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn longs(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn floats(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn doubles(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn datetimes(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn uris(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn coordinates(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn by_datatype(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn matching(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
    fn datatype_awares(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>>;
}

/// Invalidation table of the literal category.
pub fn invalidation(kind: TopicMapEventKind, _notifier: ConstructKind) -> Invalidation<LiteralTag> {
    use Invalidation::{All, None, Tags};
    use TopicMapEventKind as E;

    match kind {
        // A removed topic takes its names and occurrences with it
        E::TopicRemoved => All,
        E::NameAdded
        | E::NameRemoved
        | E::OccurrenceAdded
        | E::OccurrenceRemoved
        | E::VariantAdded
        | E::VariantRemoved
        | E::ValueModified
        | E::DatatypeSet => Tags(ALL_TAGS),
        _ => None,
    }
}

struct Inner {
    open: bool,
    subscription: Option<ListenerId>,
    constructs: Memo<LiteralTag, LiteralFilter, ConstructRef>,
}

/// Paged, sorted, invalidation-aware cache over a [`LiteralIndex`]
pub struct LiteralCache<I> {
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
        debug!("literal invalidation for {}", event.kind);
        match action {
            Invalidation::Tags(tags) => inner.constructs.clear_tags(tags),
            Invalidation::All => inner.constructs.clear_all(),
            Invalidation::None => {}
        }
    }
}

impl<I> LiteralCache<I>
where
    I: LiteralIndex + Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn TopicMapEventSource>, raw: I, config: CacheConfig) -> Self {
        info!("initializing literal cache");
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
        debug!("literal cache opened");
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
        debug!("literal cache closed");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        read_lock(&self.inner).open
    }

    pub fn stats(&self) -> CacheStats {
        read_lock(&self.inner).constructs.stats().clone()
    }

    /// Names and occurrences with the exact lexical value.
    pub fn characteristics(
        &self,
        value: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Characteristics,
            LiteralFilter::Value(LiteralValue::String(value.to_string())),
            ordering,
            offset,
            limit,
            |raw, f| raw.characteristics(f),
        )
    }

    /// Names and occurrences with the lexical value and datatype.
    pub fn characteristics_with_datatype(
        &self,
        value: &str,
        datatype: &Locator,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Characteristics,
            LiteralFilter::ValueWithDatatype(value.to_string(), datatype.clone()),
            ordering,
            offset,
            limit,
            |raw, f| raw.characteristics(f),
        )
    }

    /// Characteristics whose lexical value matches the regular expression.
    pub fn characteristics_matching(
        &self,
        pattern: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Regexp,
            LiteralFilter::Pattern(pattern.to_string()),
            ordering,
            offset,
            limit,
            |raw, f| raw.matching(f),
        )
    }

    /// Characteristics of the given datatype.
    pub fn characteristics_by_datatype(
        &self,
        datatype: &Locator,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Datatype,
            LiteralFilter::Datatype(datatype.clone()),
            ordering,
            offset,
            limit,
            |raw, f| raw.by_datatype(f),
        )
    }

    /// Datatype-aware constructs (occurrences and variants) of the datatype.
    pub fn datatype_awares(
        &self,
        datatype: &Locator,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::DatatypeAware,
            LiteralFilter::Datatype(datatype.clone()),
            ordering,
            offset,
            limit,
            |raw, f| raw.datatype_awares(f),
        )
    }

    /// Occurrences with the boolean value.
    pub fn booleans(
        &self,
        value: bool,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Boolean,
            LiteralFilter::Value(LiteralValue::Boolean(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.booleans(f),
        )
    }

    /// Occurrences with the string value.
    pub fn strings(
        &self,
        value: &str,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::String,
            LiteralFilter::Value(LiteralValue::String(value.to_string())),
            ordering,
            offset,
            limit,
            |raw, f| raw.strings(f),
        )
    }

    /// Occurrences with the exact integer value.
    pub fn integers(
        &self,
        value: i64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Integer,
            LiteralFilter::Value(LiteralValue::Integer(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.integers(f),
        )
    }

    /// Occurrences whose integer value lies within `deviance` of `value`.
    pub fn integers_about(
        &self,
        value: i64,
        deviance: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Integer,
            LiteralFilter::About(LiteralValue::Integer(value), Deviance::Numeric(deviance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.integers(f),
        )
    }

    /// Occurrences with the exact long value.
    pub fn longs(
        &self,
        value: i64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Long,
            LiteralFilter::Value(LiteralValue::Long(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.longs(f),
        )
    }

    /// Occurrences whose long value lies within `deviance` of `value`.
    pub fn longs_about(
        &self,
        value: i64,
        deviance: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Long,
            LiteralFilter::About(LiteralValue::Long(value), Deviance::Numeric(deviance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.longs(f),
        )
    }

    /// Occurrences with the exact float value.
    pub fn floats(
        &self,
        value: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Float,
            LiteralFilter::Value(LiteralValue::Float(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.floats(f),
        )
    }

    /// Occurrences whose float value lies within `deviance` of `value`.
    pub fn floats_about(
        &self,
        value: f64,
        deviance: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Float,
            LiteralFilter::About(LiteralValue::Float(value), Deviance::Numeric(deviance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.floats(f),
        )
    }

    /// Occurrences with the exact double value.
    pub fn doubles(
        &self,
        value: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Double,
            LiteralFilter::Value(LiteralValue::Double(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.doubles(f),
        )
    }

    /// Occurrences whose double value lies within `deviance` of `value`.
    pub fn doubles_about(
        &self,
        value: f64,
        deviance: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Double,
            LiteralFilter::About(LiteralValue::Double(value), Deviance::Numeric(deviance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.doubles(f),
        )
    }

    /// Occurrences with the exact date-time value.
    pub fn datetimes(
        &self,
        value: DateTime<Utc>,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::DateTime,
            LiteralFilter::Value(LiteralValue::DateTime(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.datetimes(f),
        )
    }

    /// Occurrences whose date-time value lies within `deviance` of `value`.
    pub fn datetimes_about(
        &self,
        value: DateTime<Utc>,
        deviance: Duration,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::DateTime,
            LiteralFilter::About(LiteralValue::DateTime(value), Deviance::Duration(deviance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.datetimes(f),
        )
    }

    /// Occurrences with the URI value.
    pub fn uris(
        &self,
        value: &Locator,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Uri,
            LiteralFilter::Value(LiteralValue::Uri(value.clone())),
            ordering,
            offset,
            limit,
            |raw, f| raw.uris(f),
        )
    }

    /// Occurrences with the exact coordinate value.
    pub fn coordinates(
        &self,
        value: Wgs84Coordinate,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Coordinates,
            LiteralFilter::Value(LiteralValue::Coordinates(value)),
            ordering,
            offset,
            limit,
            |raw, f| raw.coordinates(f),
        )
    }

    /// Occurrences whose coordinate lies within `distance` of `value`.
    pub fn coordinates_about(
        &self,
        value: Wgs84Coordinate,
        distance: f64,
        offset: i64,
        limit: i64,
        ordering: Option<&SortOrder<ConstructRef>>,
    ) -> Result<Page<ConstructRef>> {
        self.lookup(
            LiteralTag::Coordinates,
            LiteralFilter::About(LiteralValue::Coordinates(value), Deviance::Distance(distance)),
            ordering,
            offset,
            limit,
            |raw, f| raw.coordinates(f),
        )
    }

    fn lookup(
        &self,
        tag: LiteralTag,
        filter: LiteralFilter,
        ordering: Option<&SortOrder<ConstructRef>>,
        offset: i64,
        limit: i64,
        query: impl FnOnce(&I, &LiteralFilter) -> Result<Vec<ConstructRef>>,
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
