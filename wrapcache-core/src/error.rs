//! Error types for wrapcache operations
//!
//! Every error here is `Clone`: a single production outcome is handed to the
//! leader and to every follower waiting on the same key.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Store backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("I/O failure in {store} store: {reason}")]
    Io { store: String, reason: String },

    #[error("Failed to encode value for key {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Failed to decode value for key {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("Operation {operation} is not supported by the {store} store")]
    Unsupported { store: String, operation: String },
}

impl StoreError {
    /// Shorthand for an I/O failure in the named store.
    pub fn io(store: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Io {
            store: store.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a decode failure on `key`.
    pub fn decode(key: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Decode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for an encode failure on `key`.
    pub fn encode(key: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Encode {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown store backend: {name}")]
    UnknownStore { name: String },

    #[error("Invalid options for {store} store: {reason}")]
    InvalidOptions { store: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Failure reported by a producer.
///
/// Wraps the producer's own error behind an `Arc` so the exact same error
/// (message and source chain) reaches the leader and all followers.
#[derive(Clone)]
pub struct ProducerError {
    inner: Arc<dyn StdError + Send + Sync + 'static>,
}

#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);

impl ProducerError {
    /// Wrap an arbitrary error.
    pub fn new<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(err),
        }
    }

    /// Build a producer error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Borrow the wrapped error as a concrete type, if it is one.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Whether two handles point at the same underlying error.
    pub fn same_as(&self, other: &ProducerError) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProducerError").field(&self.inner).finish()
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl StdError for ProducerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source()
    }
}

impl From<String> for ProducerError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for ProducerError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<Box<dyn StdError + Send + Sync + 'static>> for ProducerError {
    fn from(err: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self { inner: Arc::from(err) }
    }
}

/// Master error type for all wrapcache errors.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Production for key {key} was abandoned before completing")]
    Abandoned { key: String },
}

impl CacheError {
    /// Returns true if the error came from the store backend.
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if the error came from the producer.
    pub fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_))
    }

    /// The producer's error, if this is one.
    pub fn as_producer(&self) -> Option<&ProducerError> {
        match self {
            Self::Producer(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================
