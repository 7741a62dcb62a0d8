//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

use crate::error::CacheError;

// == Ttl ==
/// Time-to-live configured for a single key.
///
/// Variant order matters: `Never` compares greater than every bounded TTL,
/// so `max` picks the longer policy when entries are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Ttl {
    /// Expires this long after the last write (or reset)
    After(Duration),
    /// Never expires on time; still subject to size eviction
    Never,
}

impl Ttl {
    /// Instant at which an entry written at `now` expires.
    ///
    /// Returns `None` for `Never`, and for durations too large to represent.
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::After(duration) => now.checked_add(duration),
            Ttl::Never => None,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        Ttl::After(duration)
    }
}

// == Cache Entry ==
/// A single cached value, or memoized failure, and its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value; `None` only for error-only entries
    pub value: Option<V>,
    /// Memoized failure returned to readers instead of the value
    pub err: Option<CacheError>,
    /// TTL configured for this key
    pub ttl: Ttl,
    /// Instant of the last write
    pub created_at: Instant,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry written at `now`.
    pub fn new(value: Option<V>, err: Option<CacheError>, ttl: Ttl, now: Instant) -> Self {
        Self {
            value,
            err,
            ttl,
            created_at: now,
            expires_at: ttl.deadline(now),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now` reaches its expiration instant, so a
    /// zero TTL is expired as soon as it is written.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Touch ==
    /// Pushes the expiration back to `now + ttl`.
    pub fn touch(&mut self, now: Instant) {
        self.expires_at = self.ttl.deadline(now);
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if the entry never expires.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}

impl<V: Clone> CacheEntry<V> {
    /// What a reader observes: the cached error if one is stored, else the value.
    pub fn result(&self) -> Result<V, CacheError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.value.clone().ok_or(CacheError::NotFound)
    }
}
