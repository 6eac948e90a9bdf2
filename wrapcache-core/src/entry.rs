//! Cache entries and their binary record format.
//!
//! An entry is an opaque payload plus an optional expiration timestamp. The
//! cache core never looks inside; only store backends do.
//!
//! # Record Format
//!
//! Byte-oriented backends persist entries as:
//! - Bytes 0-7: expiry as Unix milliseconds, little-endian `i64` (`0` = never)
//! - Bytes 8..: payload
//!
//! Expiry is kept at millisecond precision. An expiry falling exactly on the
//! epoch is written as `-1` so it still reads back as expired.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Length of the record header preceding the payload.
pub const ENTRY_HEADER_LEN: usize = 8;

/// Header value meaning "no expiry".
const NO_EXPIRY: i64 = 0;

/// A stored value with optional expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Create an entry that never expires.
    pub fn new(value: Vec<u8>) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Create an entry that expires `ttl` after `now`.
    ///
    /// `None` and a zero TTL both mean the entry never expires. A TTL too
    /// large to represent is treated the same way.
    pub fn with_ttl(value: Vec<u8>, ttl: Option<Duration>, now: DateTime<Utc>) -> Self {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));
        Self { value, expires_at }
    }

    /// Create an entry with an explicit expiration timestamp.
    pub fn expiring_at(value: Vec<u8>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: Some(expires_at),
        }
    }

    /// The stored payload.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Consume the entry and return the payload.
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// When this entry expires, if ever.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the entry has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// Whether the entry has expired as of the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Encode to the binary record format.
    pub fn encode(&self) -> Vec<u8> {
        let expiry = match self.expires_at {
            // Millisecond 0 is the no-expiry marker; one millisecond earlier
            // is just as expired.
            Some(at) if at.timestamp_millis() == NO_EXPIRY => NO_EXPIRY - 1,
            Some(at) => at.timestamp_millis(),
            None => NO_EXPIRY,
        };

        let mut bytes = Vec::with_capacity(ENTRY_HEADER_LEN + self.value.len());
        bytes.extend_from_slice(&expiry.to_le_bytes());
        bytes.extend_from_slice(&self.value);
        bytes
    }

    /// Decode from the binary record format.
    ///
    /// Returns `None` if the record is shorter than the header or the expiry
    /// is out of range.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ENTRY_HEADER_LEN {
            return None;
        }

        let header: [u8; ENTRY_HEADER_LEN] = bytes[0..ENTRY_HEADER_LEN].try_into().ok()?;
        let expiry = i64::from_le_bytes(header);
        let expires_at = if expiry == NO_EXPIRY {
            None
        } else {
            Some(DateTime::from_timestamp_millis(expiry)?)
        };

        Some(Self {
            value: bytes[ENTRY_HEADER_LEN..].to_vec(),
            expires_at,
        })
    }
}
