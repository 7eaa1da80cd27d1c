//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Error produced by a caller-supplied factory.
///
/// Shared behind an `Arc` so every caller coalesced on one computation
/// receives the very same error value.
pub type FactoryError = Arc<dyn StdError + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The factory computing a missing value failed
    #[error("Factory failed for key {key}: {source}")]
    Factory {
        key: String,
        #[source]
        source: FactoryError,
    },

    /// An invalidation pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A single entry exceeds the memory budget and the caller asked to reject it
    #[error("Entry too large: {key} needs {size} bytes, limit is {limit}")]
    EntryTooLarge { key: String, size: u64, limit: u64 },
}

impl CacheError {
    // == Factory Constructor ==
    /// Wraps any factory error for the given key.
    pub fn factory<E>(key: impl Into<String>, err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::Factory {
            key: key.into(),
            source: Arc::from(err.into()),
        }
    }

    /// Returns the underlying factory error, if this is one.
    pub fn factory_source(&self) -> Option<&FactoryError> {
        match self {
            CacheError::Factory { source, .. } => Some(source),
            _ => None,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
