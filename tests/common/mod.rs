//! In-memory topic map fixture for the integration tests
//!
//! Implements the raw-index traits and the mutation-event stream over a small
//! mutable graph, the way the real store layer would. The raw queries here
//! are deliberately simple reference implementations; the suites compare the
//! caches against them and against the mutations they publish.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Once, RwLock, RwLockReadGuard};

use tracing_subscriber::EnvFilter;

use topicmap_index::{
    ConstructKind, ConstructRef, EventBus, HierarchyFilter, IdentityIndex, Index, LiteralFilter,
    LiteralIndex, LiteralValue, Locator, Result, ScopeFilter, ScopeId, ScopedIndex,
    SupertypeSubtypeIndex, TopicMapEventKind, TypeFilter, TypeInstanceIndex,
};

#[derive(Debug, Clone)]
pub struct NameRec {
    pub parent: ConstructRef,
    pub ty: ConstructRef,
    pub value: String,
    pub scope: ScopeId,
    pub variants: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
pub struct VariantRec {
    pub name: u64,
    pub value: String,
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct OccurrenceRec {
    pub parent: ConstructRef,
    pub ty: ConstructRef,
    pub value: LiteralValue,
    pub datatype: Locator,
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct AssociationRec {
    pub ty: ConstructRef,
    pub scope: ScopeId,
    pub roles: BTreeSet<u64>,
}

#[derive(Debug, Clone)]
pub struct RoleRec {
    pub assoc: u64,
    pub ty: ConstructRef,
    pub player: ConstructRef,
}

#[derive(Default)]
pub struct MapState {
    next_id: u64,
    pub topics: BTreeSet<u64>,
    pub topic_types: BTreeMap<u64, BTreeSet<u64>>,
    pub supertypes: BTreeMap<u64, BTreeSet<u64>>,
    pub names: BTreeMap<u64, NameRec>,
    pub variants: BTreeMap<u64, VariantRec>,
    pub occurrences: BTreeMap<u64, OccurrenceRec>,
    pub associations: BTreeMap<u64, AssociationRec>,
    pub roles: BTreeMap<u64, RoleRec>,
    /// Scope object -> theme set. Scope 0 is the unconstrained scope.
    pub scopes: BTreeMap<u64, BTreeSet<u64>>,
    pub item_identifiers: BTreeMap<ConstructRef, BTreeSet<Locator>>,
    pub subject_identifiers: BTreeMap<u64, BTreeSet<Locator>>,
    pub subject_locators: BTreeMap<u64, BTreeSet<Locator>>,
}

type Shared = Arc<RwLock<MapState>>;

/// The store double: mutable graph plus event stream.
pub struct TopicMap {
    pub bus: Arc<EventBus>,
    state: Shared,
}

pub const UNCONSTRAINED: ScopeId = ScopeId(0);

static TRACING: Once = Once::new();

/// Install the log subscriber once per test binary. Run with
/// `RUST_LOG=topicmap_index=debug` to watch cache hits and invalidations.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TopicMap {
    pub fn new() -> Self {
        init_tracing();
        let mut state = MapState::default();
        state.next_id = 1;
        state.scopes.insert(0, BTreeSet::new());
        Self {
            bus: Arc::new(EventBus::new()),
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn next_id(state: &mut MapState) -> u64 {
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MapState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_topic(&self) -> ConstructRef {
        let topic = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.topics.insert(id);
            ConstructRef::topic(id)
        };
        self.bus.publish(TopicMapEventKind::TopicAdded, topic);
        topic
    }

    pub fn remove_topic(&self, topic: ConstructRef) {
        {
            let mut s = self.write();
            s.topics.remove(&topic.id);
            s.topic_types.remove(&topic.id);
            s.supertypes.remove(&topic.id);
            for supers in s.supertypes.values_mut() {
                supers.remove(&topic.id);
            }
            s.names.retain(|_, n| n.parent != topic);
            s.occurrences.retain(|_, o| o.parent != topic);
            s.subject_identifiers.remove(&topic.id);
            s.subject_locators.remove(&topic.id);
            s.item_identifiers.remove(&topic);
        }
        self.bus.publish(TopicMapEventKind::TopicRemoved, topic);
    }

    pub fn set_topic_type(&self, topic: ConstructRef, ty: ConstructRef) {
        {
            let mut s = self.write();
            s.topic_types.entry(topic.id).or_default().insert(ty.id);
        }
        self.bus.publish(TopicMapEventKind::TypeAdded, topic);
    }

    pub fn add_supertype(&self, topic: ConstructRef, supertype: ConstructRef) {
        {
            let mut s = self.write();
            s.supertypes.entry(topic.id).or_default().insert(supertype.id);
        }
        self.bus.publish(TopicMapEventKind::SupertypeAdded, topic);
    }

    pub fn remove_supertype(&self, topic: ConstructRef, supertype: ConstructRef) {
        {
            let mut s = self.write();
            if let Some(supers) = s.supertypes.get_mut(&topic.id) {
                supers.remove(&supertype.id);
            }
        }
        self.bus.publish(TopicMapEventKind::SupertypeRemoved, topic);
    }

    /// Create a scope object over the given themes.
    pub fn add_scope(&self, themes: &[ConstructRef]) -> ScopeId {
        let mut s = self.write();
        let id = Self::next_id(&mut s);
        s.scopes.insert(id, themes.iter().map(|t| t.id).collect());
        ScopeId(id)
    }

    pub fn add_name(
        &self,
        parent: ConstructRef,
        ty: ConstructRef,
        value: &str,
        scope: ScopeId,
    ) -> ConstructRef {
        let name = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.names.insert(
                id,
                NameRec {
                    parent,
                    ty,
                    value: value.to_string(),
                    scope,
                    variants: BTreeSet::new(),
                },
            );
            ConstructRef::new(ConstructKind::Name, id)
        };
        self.bus.publish(TopicMapEventKind::NameAdded, name);
        name
    }

    /// Remove a name and its variants. The store reports a single
    /// `NameRemoved`; the caches are expected to cascade to variants.
    pub fn remove_name(&self, name: ConstructRef) {
        {
            let mut s = self.write();
            if let Some(rec) = s.names.remove(&name.id) {
                for variant in rec.variants {
                    s.variants.remove(&variant);
                }
            }
        }
        self.bus.publish(TopicMapEventKind::NameRemoved, name);
    }

    pub fn add_variant(&self, name: ConstructRef, value: &str, scope: ScopeId) -> ConstructRef {
        let variant = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.variants.insert(
                id,
                VariantRec {
                    name: name.id,
                    value: value.to_string(),
                    scope,
                },
            );
            if let Some(rec) = s.names.get_mut(&name.id) {
                rec.variants.insert(id);
            }
            ConstructRef::new(ConstructKind::Variant, id)
        };
        self.bus.publish(TopicMapEventKind::VariantAdded, variant);
        variant
    }

    pub fn add_occurrence(
        &self,
        parent: ConstructRef,
        ty: ConstructRef,
        value: LiteralValue,
        datatype: Locator,
        scope: ScopeId,
    ) -> ConstructRef {
        let occurrence = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.occurrences.insert(
                id,
                OccurrenceRec {
                    parent,
                    ty,
                    value,
                    datatype,
                    scope,
                },
            );
            ConstructRef::new(ConstructKind::Occurrence, id)
        };
        self.bus
            .publish(TopicMapEventKind::OccurrenceAdded, occurrence);
        occurrence
    }

    pub fn remove_occurrence(&self, occurrence: ConstructRef) {
        {
            let mut s = self.write();
            s.occurrences.remove(&occurrence.id);
        }
        self.bus
            .publish(TopicMapEventKind::OccurrenceRemoved, occurrence);
    }

    pub fn set_occurrence_value(&self, occurrence: ConstructRef, value: LiteralValue) {
        {
            let mut s = self.write();
            if let Some(rec) = s.occurrences.get_mut(&occurrence.id) {
                rec.value = value;
            }
        }
        self.bus
            .publish(TopicMapEventKind::ValueModified, occurrence);
    }

    pub fn set_scope(&self, construct: ConstructRef, scope: ScopeId) {
        {
            let mut s = self.write();
            match construct.kind {
                ConstructKind::Name => {
                    if let Some(rec) = s.names.get_mut(&construct.id) {
                        rec.scope = scope;
                    }
                }
                ConstructKind::Occurrence => {
                    if let Some(rec) = s.occurrences.get_mut(&construct.id) {
                        rec.scope = scope;
                    }
                }
                ConstructKind::Variant => {
                    if let Some(rec) = s.variants.get_mut(&construct.id) {
                        rec.scope = scope;
                    }
                }
                ConstructKind::Association => {
                    if let Some(rec) = s.associations.get_mut(&construct.id) {
                        rec.scope = scope;
                    }
                }
                _ => {}
            }
        }
        self.bus
            .publish(TopicMapEventKind::ScopeModified, construct);
    }

    pub fn add_association(&self, ty: ConstructRef, scope: ScopeId) -> ConstructRef {
        let assoc = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.associations.insert(
                id,
                AssociationRec {
                    ty,
                    scope,
                    roles: BTreeSet::new(),
                },
            );
            ConstructRef::new(ConstructKind::Association, id)
        };
        self.bus
            .publish(TopicMapEventKind::AssociationAdded, assoc);
        assoc
    }

    pub fn remove_association(&self, assoc: ConstructRef) {
        {
            let mut s = self.write();
            if let Some(rec) = s.associations.remove(&assoc.id) {
                for role in rec.roles {
                    s.roles.remove(&role);
                }
            }
        }
        self.bus
            .publish(TopicMapEventKind::AssociationRemoved, assoc);
    }

    pub fn add_role(
        &self,
        assoc: ConstructRef,
        ty: ConstructRef,
        player: ConstructRef,
    ) -> ConstructRef {
        let role = {
            let mut s = self.write();
            let id = Self::next_id(&mut s);
            s.roles.insert(
                id,
                RoleRec {
                    assoc: assoc.id,
                    ty,
                    player,
                },
            );
            if let Some(rec) = s.associations.get_mut(&assoc.id) {
                rec.roles.insert(id);
            }
            ConstructRef::new(ConstructKind::Role, id)
        };
        self.bus.publish(TopicMapEventKind::RoleAdded, role);
        role
    }

    // Identity locators are set when a construct is created; no dedicated
    // event exists for them, matching the store boundary.

    pub fn add_item_identifier(&self, construct: ConstructRef, iri: &str) {
        let mut s = self.write();
        s.item_identifiers
            .entry(construct)
            .or_default()
            .insert(Locator::new(iri));
    }

    pub fn add_subject_identifier(&self, topic: ConstructRef, iri: &str) {
        let mut s = self.write();
        s.subject_identifiers
            .entry(topic.id)
            .or_default()
            .insert(Locator::new(iri));
    }

    pub fn add_subject_locator(&self, topic: ConstructRef, iri: &str) {
        let mut s = self.write();
        s.subject_locators
            .entry(topic.id)
            .or_default()
            .insert(Locator::new(iri));
    }

    pub fn raw_type_instance(&self) -> RawTypeInstance {
        RawTypeInstance {
            state: Arc::clone(&self.state),
            open: false,
        }
    }

    pub fn raw_identity(&self) -> RawIdentity {
        RawIdentity {
            state: Arc::clone(&self.state),
            open: false,
        }
    }

    pub fn raw_literal(&self) -> RawLiteral {
        RawLiteral {
            state: Arc::clone(&self.state),
            open: false,
        }
    }

    pub fn raw_scoped(&self) -> RawScoped {
        RawScoped {
            state: Arc::clone(&self.state),
            open: false,
        }
    }

    pub fn raw_hierarchy(&self) -> RawHierarchy {
        RawHierarchy {
            state: Arc::clone(&self.state),
            open: false,
        }
    }
}

fn read(state: &Shared) -> RwLockReadGuard<'_, MapState> {
    state.read().unwrap_or_else(|e| e.into_inner())
}

fn topic_refs(ids: impl IntoIterator<Item = u64>) -> Vec<ConstructRef> {
    ids.into_iter().map(ConstructRef::topic).collect()
}

/// Superset or intersection match of a candidate set against a reference set.
fn set_matches(candidate: &BTreeSet<u64>, reference: &[ConstructRef], all: bool) -> bool {
    if all {
        reference.iter().all(|r| candidate.contains(&r.id))
    } else {
        reference.iter().any(|r| candidate.contains(&r.id))
    }
}

macro_rules! impl_lifecycle {
    ($ty:ident) => {
        impl Index for $ty {
            fn open(&mut self) -> Result<()> {
                self.open = true;
                Ok(())
            }

            fn close(&mut self) -> Result<()> {
                self.open = false;
                Ok(())
            }

            fn is_open(&self) -> bool {
                self.open
            }
        }
    };
}

// --- Type-instance ---

pub struct RawTypeInstance {
    state: Shared,
    open: bool,
}

impl_lifecycle!(RawTypeInstance);

impl TypeInstanceIndex for RawTypeInstance {
    fn associations(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Types => topic_refs(
                s.associations
                    .values()
                    .map(|a| a.ty.id)
                    .collect::<BTreeSet<_>>(),
            ),
            TypeFilter::Instances(ty) => s
                .associations
                .iter()
                .filter(|(_, a)| Some(a.ty) == *ty)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Association, *id))
                .collect(),
            TypeFilter::Matching { types, all } => s
                .associations
                .iter()
                .filter(|(_, a)| {
                    let own: BTreeSet<u64> = [a.ty.id].into_iter().collect();
                    set_matches(&own, types, *all)
                })
                .map(|(id, _)| ConstructRef::new(ConstructKind::Association, *id))
                .collect(),
        })
    }

    fn characteristics(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let mut out = self.names(filter)?;
        out.extend(self.occurrences(filter)?);
        Ok(out)
    }

    fn names(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Types => {
                topic_refs(s.names.values().map(|n| n.ty.id).collect::<BTreeSet<_>>())
            }
            TypeFilter::Instances(ty) => s
                .names
                .iter()
                .filter(|(_, n)| Some(n.ty) == *ty)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
                .collect(),
            TypeFilter::Matching { types, all } => s
                .names
                .iter()
                .filter(|(_, n)| {
                    let own: BTreeSet<u64> = [n.ty.id].into_iter().collect();
                    set_matches(&own, types, *all)
                })
                .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
                .collect(),
        })
    }

    fn occurrences(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Types => topic_refs(
                s.occurrences
                    .values()
                    .map(|o| o.ty.id)
                    .collect::<BTreeSet<_>>(),
            ),
            TypeFilter::Instances(ty) => s
                .occurrences
                .iter()
                .filter(|(_, o)| Some(o.ty) == *ty)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id))
                .collect(),
            TypeFilter::Matching { types, all } => s
                .occurrences
                .iter()
                .filter(|(_, o)| {
                    let own: BTreeSet<u64> = [o.ty.id].into_iter().collect();
                    set_matches(&own, types, *all)
                })
                .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id))
                .collect(),
        })
    }

    fn roles(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Types => {
                topic_refs(s.roles.values().map(|r| r.ty.id).collect::<BTreeSet<_>>())
            }
            TypeFilter::Instances(ty) => s
                .roles
                .iter()
                .filter(|(_, r)| Some(r.ty) == *ty)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Role, *id))
                .collect(),
            TypeFilter::Matching { types, all } => s
                .roles
                .iter()
                .filter(|(_, r)| {
                    let own: BTreeSet<u64> = [r.ty.id].into_iter().collect();
                    set_matches(&own, types, *all)
                })
                .map(|(id, _)| ConstructRef::new(ConstructKind::Role, *id))
                .collect(),
        })
    }

    fn topics(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Types => topic_refs(
                s.topic_types
                    .values()
                    .flatten()
                    .copied()
                    .collect::<BTreeSet<_>>(),
            ),
            TypeFilter::Instances(Some(ty)) => topic_refs(
                s.topics
                    .iter()
                    .filter(|t| {
                        s.topic_types
                            .get(*t)
                            .map_or(false, |types| types.contains(&ty.id))
                    })
                    .copied()
                    .collect::<Vec<_>>(),
            ),
            TypeFilter::Instances(None) => topic_refs(
                s.topics
                    .iter()
                    .filter(|t| s.topic_types.get(*t).map_or(true, BTreeSet::is_empty))
                    .copied()
                    .collect::<Vec<_>>(),
            ),
            TypeFilter::Matching { types, all } => topic_refs(
                s.topics
                    .iter()
                    .filter(|t| {
                        let own = s.topic_types.get(*t).cloned().unwrap_or_default();
                        set_matches(&own, types, *all)
                    })
                    .copied()
                    .collect::<Vec<_>>(),
            ),
        })
    }

    fn variants(&self, filter: &TypeFilter) -> Result<Vec<ConstructRef>> {
        // Variants are untyped; they are reached through their name's type.
        let s = read(&self.state);
        Ok(match filter {
            TypeFilter::Instances(Some(ty)) => s
                .variants
                .iter()
                .filter(|(_, v)| s.names.get(&v.name).map_or(false, |n| n.ty == *ty))
                .map(|(id, _)| ConstructRef::new(ConstructKind::Variant, *id))
                .collect(),
            _ => Vec::new(),
        })
    }
}

// --- Identity ---

pub struct RawIdentity {
    state: Shared,
    open: bool,
}

impl_lifecycle!(RawIdentity);

impl RawIdentity {
    fn matching_constructs<'a>(
        map: impl Iterator<Item = (ConstructRef, &'a BTreeSet<Locator>)>,
        pattern: &str,
    ) -> Vec<ConstructRef> {
        map.filter(|(_, locs)| locs.iter().any(|l| l.as_str().contains(pattern)))
            .map(|(c, _)| c)
            .collect()
    }
}

impl IdentityIndex for RawIdentity {
    fn item_identifiers(&self) -> Result<Vec<Locator>> {
        let s = read(&self.state);
        Ok(s.item_identifiers
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn subject_identifiers(&self) -> Result<Vec<Locator>> {
        let s = read(&self.state);
        Ok(s.subject_identifiers
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn subject_locators(&self) -> Result<Vec<Locator>> {
        let s = read(&self.state);
        Ok(s.subject_locators
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    fn constructs_by_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>> {
        let mut out = self.constructs_by_item_identifier_pattern(pattern)?;
        out.extend(self.topics_by_subject_identifier_pattern(pattern)?);
        out.extend(self.topics_by_subject_locator_pattern(pattern)?);
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    fn constructs_by_item_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(Self::matching_constructs(
            s.item_identifiers.iter().map(|(c, locs)| (*c, locs)),
            pattern,
        ))
    }

    fn topics_by_subject_identifier_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(Self::matching_constructs(
            s.subject_identifiers
                .iter()
                .map(|(t, locs)| (ConstructRef::topic(*t), locs)),
            pattern,
        ))
    }

    fn topics_by_subject_locator_pattern(&self, pattern: &str) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(Self::matching_constructs(
            s.subject_locators
                .iter()
                .map(|(t, locs)| (ConstructRef::topic(*t), locs)),
            pattern,
        ))
    }
}

// --- Literal ---

pub struct RawLiteral {
    state: Shared,
    open: bool,
}

impl_lifecycle!(RawLiteral);

impl RawLiteral {
    fn occurrences_where(
        &self,
        predicate: impl Fn(&OccurrenceRec) -> bool,
    ) -> Vec<ConstructRef> {
        let s = read(&self.state);
        s.occurrences
            .iter()
            .filter(|(_, o)| predicate(o))
            .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id))
            .collect()
    }

    fn value_matches(filter: &LiteralFilter, value: &LiteralValue) -> bool {
        match filter {
            LiteralFilter::Value(v) => v == value,
            LiteralFilter::About(reference, deviance) => about(reference, deviance, value),
            _ => false,
        }
    }
}

/// Range match of `value` around `reference` within `deviance`.
fn about(
    reference: &LiteralValue,
    deviance: &topicmap_index::Deviance,
    value: &LiteralValue,
) -> bool {
    use topicmap_index::Deviance;
    match (reference, value, deviance) {
        (LiteralValue::Integer(r), LiteralValue::Integer(v), Deviance::Numeric(d))
        | (LiteralValue::Long(r), LiteralValue::Long(v), Deviance::Numeric(d)) => {
            ((r - v).abs() as f64) <= *d
        }
        (LiteralValue::Float(r), LiteralValue::Float(v), Deviance::Numeric(d))
        | (LiteralValue::Double(r), LiteralValue::Double(v), Deviance::Numeric(d)) => {
            (r - v).abs() <= *d
        }
        (LiteralValue::DateTime(r), LiteralValue::DateTime(v), Deviance::Duration(d)) => {
            (*r - *v).abs() <= *d
        }
        (
            LiteralValue::Coordinates(r),
            LiteralValue::Coordinates(v),
            Deviance::Distance(d),
        ) => {
            let dlat = r.latitude - v.latitude;
            let dlng = r.longitude - v.longitude;
            (dlat * dlat + dlng * dlng).sqrt() <= *d
        }
        _ => false,
    }
}

impl LiteralIndex for RawLiteral {
    fn characteristics(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        let mut out: Vec<ConstructRef> = match filter {
            LiteralFilter::Value(LiteralValue::String(v)) => s
                .names
                .iter()
                .filter(|(_, n)| &n.value == v)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
                .collect(),
            LiteralFilter::ValueWithDatatype(v, _) => s
                .names
                .iter()
                .filter(|(_, n)| &n.value == v)
                .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
                .collect(),
            _ => Vec::new(),
        };
        match filter {
            LiteralFilter::Value(LiteralValue::String(v)) => {
                out.extend(
                    s.occurrences
                        .iter()
                        .filter(|(_, o)| o.value == LiteralValue::String(v.clone()))
                        .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id)),
                );
            }
            LiteralFilter::ValueWithDatatype(v, dt) => {
                out.extend(
                    s.occurrences
                        .iter()
                        .filter(|(_, o)| {
                            o.value == LiteralValue::String(v.clone()) && &o.datatype == dt
                        })
                        .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id)),
                );
            }
            _ => {}
        }
        Ok(out)
    }

    fn booleans(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn strings(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn integers(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn longs(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn floats(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn doubles(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn datetimes(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn uris(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn coordinates(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(self.occurrences_where(|o| RawLiteral::value_matches(filter, &o.value)))
    }

    fn by_datatype(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        Ok(match filter {
            LiteralFilter::Datatype(dt) => {
                let dt = dt.clone();
                self.occurrences_where(move |o| o.datatype == dt)
            }
            _ => Vec::new(),
        })
    }

    fn matching(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        // Substring stand-in for regular expressions; good enough for a double
        let s = read(&self.state);
        Ok(match filter {
            LiteralFilter::Pattern(p) => {
                let mut out: Vec<ConstructRef> = s
                    .names
                    .iter()
                    .filter(|(_, n)| n.value.contains(p.as_str()))
                    .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
                    .collect();
                out.extend(
                    s.occurrences
                        .iter()
                        .filter(|(_, o)| match &o.value {
                            LiteralValue::String(v) => v.contains(p.as_str()),
                            _ => false,
                        })
                        .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id)),
                );
                out
            }
            _ => Vec::new(),
        })
    }

    fn datatype_awares(&self, filter: &LiteralFilter) -> Result<Vec<ConstructRef>> {
        self.by_datatype(filter)
    }
}

// --- Scoped ---

pub struct RawScoped {
    state: Shared,
    open: bool,
}

impl_lifecycle!(RawScoped);

impl RawScoped {
    fn scope_matches(s: &MapState, scope: ScopeId, filter: &ScopeFilter) -> bool {
        let themes = s.scopes.get(&scope.0).cloned().unwrap_or_default();
        match filter {
            ScopeFilter::Theme(Some(theme)) => themes.contains(&theme.id),
            ScopeFilter::Theme(None) => themes.is_empty(),
            ScopeFilter::ThemesMatching { themes: refs, all } => {
                set_matches(&themes, refs, *all)
            }
            ScopeFilter::Scope(id) => scope == *id,
            ScopeFilter::InScopes(ids) => ids.contains(&scope),
            ScopeFilter::Scopes | ScopeFilter::Themes => false,
        }
    }

    fn axis_scopes(&self, scopes: impl Iterator<Item = ScopeId>) -> Vec<ScopeId> {
        let distinct: BTreeSet<ScopeId> = scopes.collect();
        distinct.into_iter().collect()
    }

    fn axis_themes(&self, s: &MapState, scopes: impl Iterator<Item = ScopeId>) -> Vec<ConstructRef> {
        let mut themes = BTreeSet::new();
        for scope in scopes {
            if let Some(set) = s.scopes.get(&scope.0) {
                themes.extend(set.iter().copied());
            }
        }
        topic_refs(themes)
    }
}

impl ScopedIndex for RawScoped {
    fn association_scopes(&self) -> Result<Vec<ScopeId>> {
        let s = read(&self.state);
        Ok(self.axis_scopes(s.associations.values().map(|a| a.scope)))
    }

    fn association_themes(&self) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.axis_themes(&s, s.associations.values().map(|a| a.scope)))
    }

    fn associations(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(s.associations
            .iter()
            .filter(|(_, a)| Self::scope_matches(&s, a.scope, filter))
            .map(|(id, _)| ConstructRef::new(ConstructKind::Association, *id))
            .collect())
    }

    fn occurrence_scopes(&self) -> Result<Vec<ScopeId>> {
        let s = read(&self.state);
        Ok(self.axis_scopes(s.occurrences.values().map(|o| o.scope)))
    }

    fn occurrence_themes(&self) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.axis_themes(&s, s.occurrences.values().map(|o| o.scope)))
    }

    fn occurrences(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(s.occurrences
            .iter()
            .filter(|(_, o)| Self::scope_matches(&s, o.scope, filter))
            .map(|(id, _)| ConstructRef::new(ConstructKind::Occurrence, *id))
            .collect())
    }

    fn name_scopes(&self) -> Result<Vec<ScopeId>> {
        let s = read(&self.state);
        Ok(self.axis_scopes(s.names.values().map(|n| n.scope)))
    }

    fn name_themes(&self) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.axis_themes(&s, s.names.values().map(|n| n.scope)))
    }

    fn names(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(s.names
            .iter()
            .filter(|(_, n)| Self::scope_matches(&s, n.scope, filter))
            .map(|(id, _)| ConstructRef::new(ConstructKind::Name, *id))
            .collect())
    }

    fn variant_scopes(&self) -> Result<Vec<ScopeId>> {
        let s = read(&self.state);
        Ok(self.axis_scopes(s.variants.values().map(|v| v.scope)))
    }

    fn variant_themes(&self) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.axis_themes(&s, s.variants.values().map(|v| v.scope)))
    }

    fn variants(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(s.variants
            .iter()
            .filter(|(_, v)| Self::scope_matches(&s, v.scope, filter))
            .map(|(id, _)| ConstructRef::new(ConstructKind::Variant, *id))
            .collect())
    }

    fn scopes(&self, filter: &ScopeFilter) -> Result<Vec<ScopeId>> {
        let s = read(&self.state);
        Ok(s.scopes
            .keys()
            .map(|id| ScopeId(*id))
            .filter(|scope| Self::scope_matches(&s, *scope, filter))
            .collect())
    }

    fn scopables(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let mut out = self.associations(filter)?;
        out.extend(self.occurrences(filter)?);
        out.extend(self.names(filter)?);
        out.extend(self.variants(filter)?);
        Ok(out)
    }

    fn characteristics(&self, filter: &ScopeFilter) -> Result<Vec<ConstructRef>> {
        let mut out = self.names(filter)?;
        out.extend(self.occurrences(filter)?);
        Ok(out)
    }
}

// --- Supertype-subtype ---

pub struct RawHierarchy {
    state: Shared,
    open: bool,
}

impl_lifecycle!(RawHierarchy);

impl RawHierarchy {
    fn closure(
        edges: &BTreeMap<u64, BTreeSet<u64>>,
        start: u64,
    ) -> BTreeSet<u64> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<u64> = edges.get(&start).into_iter().flatten().copied().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(edges.get(&next).into_iter().flatten().copied());
            }
        }
        seen
    }

    fn inverted(edges: &BTreeMap<u64, BTreeSet<u64>>) -> BTreeMap<u64, BTreeSet<u64>> {
        let mut out: BTreeMap<u64, BTreeSet<u64>> = BTreeMap::new();
        for (sub, supers) in edges {
            for sup in supers {
                out.entry(*sup).or_default().insert(*sub);
            }
        }
        out
    }

    fn query(
        &self,
        edges: &BTreeMap<u64, BTreeSet<u64>>,
        topics: &BTreeSet<u64>,
        filter: &HierarchyFilter,
        transitive: bool,
    ) -> Vec<ConstructRef> {
        match filter {
            HierarchyFilter::Global => topic_refs(
                edges
                    .values()
                    .flatten()
                    .copied()
                    .collect::<BTreeSet<_>>(),
            ),
            HierarchyFilter::Of(Some(topic)) => {
                if transitive {
                    topic_refs(Self::closure(edges, topic.id))
                } else {
                    topic_refs(edges.get(&topic.id).cloned().unwrap_or_default())
                }
            }
            HierarchyFilter::Of(None) => topic_refs(
                topics
                    .iter()
                    .filter(|t| edges.get(*t).map_or(true, BTreeSet::is_empty))
                    .copied()
                    .collect::<Vec<_>>(),
            ),
            HierarchyFilter::Matching { types, all } => topic_refs(
                topics
                    .iter()
                    .filter(|t| {
                        let own = if transitive {
                            Self::closure(edges, **t)
                        } else {
                            edges.get(*t).cloned().unwrap_or_default()
                        };
                        set_matches(&own, types, *all)
                    })
                    .copied()
                    .collect::<Vec<_>>(),
            ),
        }
    }
}

impl SupertypeSubtypeIndex for RawHierarchy {
    fn supertypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.query(&s.supertypes, &s.topics, filter, true))
    }

    fn subtypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        let inverted = Self::inverted(&s.supertypes);
        Ok(self.query(&inverted, &s.topics, filter, true))
    }

    fn direct_supertypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        Ok(self.query(&s.supertypes, &s.topics, filter, false))
    }

    fn direct_subtypes(&self, filter: &HierarchyFilter) -> Result<Vec<ConstructRef>> {
        let s = read(&self.state);
        let inverted = Self::inverted(&s.supertypes);
        Ok(self.query(&inverted, &s.topics, filter, false))
    }
}
