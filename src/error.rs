//! Error types for index and cache operations
//!
//! The cache layer adds exactly one failure mode of its own: using an index
//! that has not been opened (or has been closed). Everything else originates
//! in the underlying raw index or store and is passed through unmodified.

use thiserror::Error;

/// Main error type for index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Operation attempted while the index is not open
    #[error("index is closed")]
    Closed,

    /// Failure reported by the underlying raw index or store
    #[error("store error: {0}")]
    Store(String),

    /// Invalid cache configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("error: {0}")]
    Other(String),
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

impl From<String> for IndexError {
    fn from(s: String) -> Self {
        IndexError::Other(s)
    }
}

impl From<&str> for IndexError {
    fn from(s: &str) -> Self {
        IndexError::Other(s.to_string())
    }
}
