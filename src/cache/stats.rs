//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, expirations and
//! evictions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Cache label, if one was given
    pub name: Option<String>,
    /// Number of lookups that returned a value
    pub hits: u64,
    /// Number of lookups that found nothing (missing or expired)
    pub misses: u64,
    /// Number of lookups answered with a memoized error
    pub cached_errors: u64,
    /// Number of entries dropped because their TTL lapsed
    pub expired: u64,
    /// Number of entries dropped to honor the size limit
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Size limit, None = unbounded
    pub limit: Option<usize>,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    /// Memoized errors count as hits: the cache answered without recomputation.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.cached_errors;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Counters ==
/// Lock-free counters updated from both shared and exclusive lock paths.
#[derive(Debug, Default)]
pub struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    cached_errors: AtomicU64,
    expired: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cached_error(&self) {
        self.cached_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: usize) {
        self.expired.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Copies the counters into a serializable snapshot.
    pub fn snapshot(
        &self,
        name: Option<String>,
        total_entries: usize,
        limit: Option<usize>,
    ) -> CacheStats {
        CacheStats {
            name,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached_errors: self.cached_errors.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_entries,
            limit,
        }
    }
}
