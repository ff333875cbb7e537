//! Mutation-event stream boundary
//!
//! The store delivers mutation events synchronously and serially: one event is
//! fully processed by every listener before the next is delivered. Cache
//! facades subscribe while open and translate each event into cache
//! invalidations; event handling itself must never fail observably.

use crate::model::{ConstructRef, LiteralValue, Locator, ScopeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Kind of a store mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopicMapEventKind {
    TopicAdded,
    TopicRemoved,
    AssociationAdded,
    AssociationRemoved,
    RoleAdded,
    RoleRemoved,
    NameAdded,
    NameRemoved,
    OccurrenceAdded,
    OccurrenceRemoved,
    VariantAdded,
    VariantRemoved,
    TypeAdded,
    TypeRemoved,
    SupertypeAdded,
    SupertypeRemoved,
    ScopeModified,
    PlayerModified,
    ValueModified,
    DatatypeSet,
}

impl fmt::Display for TopicMapEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Payload attached to an event as old or new value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventValue {
    Construct(ConstructRef),
    Scope(ScopeId),
    Literal(LiteralValue),
    Locator(Locator),
}

/// A single store mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicMapEvent {
    /// Monotonic event id assigned by the store
    pub id: u64,

    /// What happened
    pub kind: TopicMapEventKind,

    /// The construct the event was reported on
    pub notifier: ConstructRef,

    /// Value after the mutation, if any
    pub new_value: Option<EventValue>,

    /// Value before the mutation, if any
    pub old_value: Option<EventValue>,
}

impl TopicMapEvent {
    pub fn new(id: u64, kind: TopicMapEventKind, notifier: ConstructRef) -> Self {
        Self {
            id,
            kind,
            notifier,
            new_value: None,
            old_value: None,
        }
    }

    pub fn with_new_value(mut self, value: EventValue) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn with_old_value(mut self, value: EventValue) -> Self {
        self.old_value = Some(value);
        self
    }
}

/// Receiver of store mutations
pub trait TopicMapListener: Send + Sync {
    /// Handle one mutation. Must not fail; an event the listener does not
    /// recognize is a no-op.
    fn on_event(&self, event: &TopicMapEvent);
}

/// Identifier of an active subscription
pub type ListenerId = u64;

/// Source of store mutations
pub trait TopicMapEventSource: Send + Sync {
    /// Register a listener; delivery is serial, in subscription order.
    fn subscribe(&self, listener: Arc<dyn TopicMapListener>) -> ListenerId;

    /// Remove a previously registered listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: ListenerId);
}

/// In-process event source with serial fan-out
///
/// The store side publishes through [`EventBus::publish`]; each listener is
/// invoked synchronously before the next event can be published.
#[derive(Default)]
pub struct EventBus {
    inner: RwLock<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: ListenerId,
    next_event: u64,
    listeners: Vec<(ListenerId, Arc<dyn TopicMapListener>)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every subscribed listener, in subscription order.
    pub fn publish(&self, kind: TopicMapEventKind, notifier: ConstructRef) {
        self.publish_event(|id| TopicMapEvent::new(id, kind, notifier));
    }

    /// Deliver an event built by the caller (for events carrying values).
    pub fn publish_event(&self, build: impl FnOnce(u64) -> TopicMapEvent) {
        let (event, listeners) = {
            let mut inner = lock_write(&self.inner);
            let id = inner.next_event;
            inner.next_event += 1;
            let event = build(id);
            let listeners: Vec<_> = inner
                .listeners
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            (event, listeners)
        };

        debug!(
            "publishing event {} ({}) on {}",
            event.id, event.kind, event.notifier
        );
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    /// Number of active subscriptions
    pub fn listener_count(&self) -> usize {
        lock_read(&self.inner).listeners.len()
    }
}

impl TopicMapEventSource for EventBus {
    fn subscribe(&self, listener: Arc<dyn TopicMapListener>) -> ListenerId {
        let mut inner = lock_write(&self.inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, listener));
        debug!("listener {} subscribed", id);
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        let mut inner = lock_write(&self.inner);
        inner.listeners.retain(|(lid, _)| *lid != id);
        debug!("listener {} unsubscribed", id);
    }
}

fn lock_read(lock: &RwLock<BusInner>) -> std::sync::RwLockReadGuard<'_, BusInner> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn lock_write(lock: &RwLock<BusInner>) -> std::sync::RwLockWriteGuard<'_, BusInner> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
