//! Domain boundary types
//!
//! The cache layer treats constructs as opaque: all it needs is a stable
//! identity and the runtime kind. Constructs are referenced through integer
//! handles assigned by the store; the cache never owns construct data, and
//! removal events clear every namespace that could hold a handle, so a cached
//! key cannot outlive its construct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime kind of a construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructKind {
    Topic,
    Association,
    Role,
    Name,
    Occurrence,
    Variant,
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructKind::Topic => write!(f, "topic"),
            ConstructKind::Association => write!(f, "association"),
            ConstructKind::Role => write!(f, "role"),
            ConstructKind::Name => write!(f, "name"),
            ConstructKind::Occurrence => write!(f, "occurrence"),
            ConstructKind::Variant => write!(f, "variant"),
        }
    }
}

/// Handle to a construct owned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstructRef {
    pub kind: ConstructKind,
    pub id: u64,
}

impl ConstructRef {
    pub fn new(kind: ConstructKind, id: u64) -> Self {
        Self { kind, id }
    }

    /// Shorthand for a topic handle
    pub fn topic(id: u64) -> Self {
        Self::new(ConstructKind::Topic, id)
    }
}

impl fmt::Display for ConstructRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Object identity of a scope
///
/// Two scopes with the same theme set may still be distinct objects; the
/// cache keys by this identity, never by theme-set equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeId(pub u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// IRI locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locator(pub String);

impl Locator {
    pub fn new(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator(s.to_string())
    }
}

/// WGS84 geographic coordinate
///
/// Equality and hashing use the bit patterns of the components so coordinates
/// can participate in cache keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Wgs84Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Wgs84Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl PartialEq for Wgs84Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for Wgs84Coordinate {}

impl Hash for Wgs84Coordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

/// Typed literal value of a name, occurrence or variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiteralValue {
    Boolean(bool),
    String(String),
    Integer(i64),
    Long(i64),
    Float(f64),
    Double(f64),
    DateTime(DateTime<Utc>),
    Uri(Locator),
    Coordinates(Wgs84Coordinate),
}

impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        use LiteralValue::*;
        match (self, other) {
            (Boolean(a), Boolean(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (DateTime(a), DateTime(b)) => a == b,
            (Uri(a), Uri(b)) => a == b,
            (Coordinates(a), Coordinates(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            LiteralValue::Boolean(v) => v.hash(state),
            LiteralValue::String(v) => v.hash(state),
            LiteralValue::Integer(v) | LiteralValue::Long(v) => v.hash(state),
            LiteralValue::Float(v) | LiteralValue::Double(v) => v.to_bits().hash(state),
            LiteralValue::DateTime(v) => v.hash(state),
            LiteralValue::Uri(v) => v.hash(state),
            LiteralValue::Coordinates(v) => v.hash(state),
        }
    }
}

/// Allowed deviation for range-matching literal queries
#[derive(Debug, Clone)]
pub enum Deviance {
    /// Numeric tolerance for integer/float/double values
    Numeric(f64),
    /// Temporal tolerance for date-time values
    Duration(chrono::Duration),
    /// Geographic distance tolerance for coordinates
    Distance(f64),
}

impl PartialEq for Deviance {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Deviance::Numeric(a), Deviance::Numeric(b)) => a.to_bits() == b.to_bits(),
            (Deviance::Duration(a), Deviance::Duration(b)) => a == b,
            (Deviance::Distance(a), Deviance::Distance(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Deviance {}

impl Hash for Deviance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Deviance::Numeric(v) | Deviance::Distance(v) => v.to_bits().hash(state),
            Deviance::Duration(d) => d.num_milliseconds().hash(state),
        }
    }
}
