//! Cache keys.
//!
//! A [`CacheKey`] is an opaque, comparable identifier. It can be built from a
//! plain string, from a namespace and an id, or from any serializable value.
//! Uniqueness is the caller's responsibility.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::StoreError;

/// Separator between a namespace (or prefix) and the rest of a key.
pub const KEY_SEPARATOR: char = ':';

/// An opaque cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create a key of the form `namespace:id`.
    ///
    /// ```
    /// use wrapcache_core::CacheKey;
    ///
    /// let key = CacheKey::scoped("user", 42);
    /// assert_eq!(key.as_str(), "user:42");
    /// ```
    pub fn scoped(namespace: &str, id: impl fmt::Display) -> Self {
        Self(format!("{namespace}{KEY_SEPARATOR}{id}"))
    }

    /// Create a key from a structured value using its JSON serialization.
    ///
    /// Struct fields serialize in declaration order, so the key is stable for
    /// a given type. Maps with unspecified iteration order (`HashMap`) do not
    /// give stable keys; use `BTreeMap` in key types.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, StoreError> {
        serde_json::to_string(value)
            .map(Self)
            .map_err(|e| StoreError::encode("<structured key>", e))
    }

    /// Return a copy of this key namespaced under `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self::scoped(prefix, &self.0)
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the key as raw bytes (what byte-oriented backends store).
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Consume the key and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&String> for CacheKey {
    fn from(key: &String) -> Self {
        Self(key.clone())
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
