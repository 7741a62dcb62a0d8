//! Cache Store Module
//!
//! Typed cache engine combining HashMap storage with FIFO eviction order,
//! lazy TTL expiration and memoized errors.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, InsertionOrder, StatsCounters, Ttl, DEFAULT_LIMIT};
use crate::error::CacheError;
use crate::keeper::{Keeper, Sweep};

// == Read Options ==
/// Expiry extension requested by a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Extend a healthy entry to `now + ttl`
    pub reset_timer: bool,
    /// Extend the entry only while it holds a cached error
    pub reset_timer_on_err: bool,
}

impl ReadOptions {
    pub const NONE: Self = Self {
        reset_timer: false,
        reset_timer_on_err: false,
    };

    pub const RESET_TIMER: Self = Self {
        reset_timer: true,
        reset_timer_on_err: false,
    };

    pub const RESET_TIMER_ON_ERR: Self = Self {
        reset_timer: false,
        reset_timer_on_err: true,
    };

    fn extends(self) -> bool {
        self.reset_timer || self.reset_timer_on_err
    }

    fn apply<V>(self, entry: &mut CacheEntry<V>, now: Instant) {
        let erroring = entry.err.is_some();
        if (self.reset_timer && !erroring) || (self.reset_timer_on_err && erroring) {
            entry.touch(now);
        }
    }
}

// == Sweep Outcome ==
/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    /// Entries whose TTL had lapsed
    pub expired: usize,
    /// Entries dropped to get back under the limit
    pub evicted: usize,
}

// == Cache State ==
/// Everything guarded by the cache lock.
struct State<K, V> {
    items: HashMap<K, CacheEntry<V>>,
    order: InsertionOrder<K>,
    limit: Option<usize>,
    throttle: Option<Duration>,
    last_sweep: Instant,
}

impl<K, V> State<K, V>
where
    K: Eq + Hash + Clone,
{
    fn new(limit: Option<usize>) -> Self {
        Self {
            items: HashMap::new(),
            order: InsertionOrder::new(),
            limit,
            throttle: None,
            last_sweep: Instant::now(),
        }
    }

    /// Live entry for `key`, or why there is none.
    fn entry<Q>(&self, key: &Q, now: Instant) -> Result<&CacheEntry<V>, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.items.get(key) {
            None => Err(CacheError::NotFound),
            Some(entry) if entry.is_expired_at(now) => Err(CacheError::Expired),
            Some(entry) => Ok(entry),
        }
    }

    fn entry_mut<Q>(&mut self, key: &Q, now: Instant) -> Result<&mut CacheEntry<V>, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.items.get_mut(key) {
            None => Err(CacheError::NotFound),
            Some(entry) if entry.is_expired_at(now) => Err(CacheError::Expired),
            Some(entry) => Ok(entry),
        }
    }

    /// Stores an entry. Rewriting a live key keeps the longer TTL and its
    /// place in the eviction order.
    fn store(&mut self, key: K, value: Option<V>, err: Option<CacheError>, ttl: Ttl, now: Instant) {
        let live_ttl = self.entry(&key, now).ok().map(|entry| entry.ttl);

        let ttl = match live_ttl {
            Some(existing) => ttl.max(existing),
            None => {
                // An expired entry not yet swept still holds a slot in the order.
                if self.items.contains_key(&key) {
                    self.order.remove(&key);
                }
                self.order.push(key.clone());
                ttl
            }
        };

        self.items.insert(key, CacheEntry::new(value, err, ttl, now));
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.items.remove(key);
        if removed.is_some() {
            self.order.remove(key);
        }
        removed
    }

    /// Drops expired entries, then the oldest entries until within the limit.
    fn sweep(&mut self, now: Instant) -> SweepOutcome {
        let before = self.items.len();
        self.items.retain(|_, entry| !entry.is_expired_at(now));
        let expired = before - self.items.len();

        if expired > 0 {
            let items = &self.items;
            self.order.retain(|key| items.contains_key(key));
        }

        let mut evicted = 0;
        if let Some(limit) = self.limit {
            while self.items.len() > limit {
                match self.order.pop_oldest() {
                    Some(key) => {
                        if self.items.remove(&key).is_some() {
                            evicted += 1;
                        }
                    }
                    None => break,
                }
            }
        }

        self.last_sweep = now;
        SweepOutcome { expired, evicted }
    }

    /// Runs the sweep from a write path if the throttle window has passed.
    fn maybe_sweep(&mut self, now: Instant) -> Option<SweepOutcome> {
        let window = self.throttle?;
        if now.saturating_duration_since(self.last_sweep) >= window {
            Some(self.sweep(now))
        } else {
            None
        }
    }
}

// == Shared Inner ==
struct Inner<K, V> {
    state: RwLock<State<K, V>>,
    token: CancellationToken,
    name: Option<String>,
    stats: StatsCounters,
}

impl<K, V> Inner<K, V> {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }

    fn record(&self, outcome: SweepOutcome) {
        self.stats.record_expired(outcome.expired);
        self.stats.record_evictions(outcome.evicted);
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
{
    fn sweep(&self) -> SweepOutcome {
        let (outcome, remaining) = {
            let mut state = self.state.write();
            let outcome = state.sweep(Instant::now());
            (outcome, state.items.len())
        };

        self.record(outcome);
        debug!(
            cache = self.label(),
            expired = outcome.expired,
            evicted = outcome.evicted,
            remaining,
            "Cache sweep complete"
        );
        outcome
    }

    fn stats(&self) -> CacheStats {
        let state = self.state.read();
        self.stats
            .snapshot(self.name.clone(), state.items.len(), state.limit)
    }
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone,
    V: Serialize,
{
    /// Serializes each live value on its own, oldest first.
    fn items(&self) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let now = Instant::now();
        let mut items = Vec::with_capacity(state.items.len());

        for key in state.order.iter() {
            let Some(entry) = state.items.get(key) else {
                continue;
            };
            if entry.is_expired_at(now) {
                continue;
            }
            let Some(value) = &entry.value else {
                continue;
            };

            match serde_json::to_vec(value) {
                Ok(bytes) => items.push(bytes),
                Err(err) => warn!(
                    cache = self.label(),
                    error = %err,
                    "Skipping cache value that failed to serialize"
                ),
            }
        }

        items
    }
}

impl<K, V> Sweep for Inner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Serialize + Send + Sync + 'static,
{
    fn check(&self) -> SweepOutcome {
        self.sweep()
    }

    fn is_done(&self) -> bool {
        self.token.is_cancelled()
    }

    fn items(&self) -> Vec<Vec<u8>> {
        Inner::items(self)
    }

    fn stats(&self) -> CacheStats {
        Inner::stats(self)
    }
}

// == Cache ==
/// Typed TTL cache with a size bound, shared by cloning the handle.
///
/// Every read checks expiry itself, so a stale entry is never returned even
/// if no sweep has run. Sweeps reclaim memory and enforce the limit; they run
/// from [`Cache::check`], from the [`Keeper`] the cache is registered with,
/// and optionally from write paths (see [`Cache::sweep_throttle`]).
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("cancelled", &self.inner.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty cache bound to `token`, limited to [`DEFAULT_LIMIT`]
    /// entries.
    ///
    /// Cancelling the token tells a keeper to stop sweeping the cache; the
    /// cache itself stays usable.
    pub fn new(token: CancellationToken) -> Self {
        Self::build(token, None)
    }

    /// Creates a cache with a label used in logs and stats.
    pub fn named(token: CancellationToken, name: impl Into<String>) -> Self {
        Self::build(token, Some(name.into()))
    }

    fn build(token: CancellationToken, name: Option<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::new(Some(DEFAULT_LIMIT))),
                token,
                name,
                stats: StatsCounters::new(),
            }),
        }
    }

    // == Configuration ==
    /// Caps the number of live entries kept after a sweep.
    pub fn set_limit(&self, limit: usize) -> &Self {
        self.inner.state.write().limit = Some(limit);
        self
    }

    /// Removes the size bound.
    pub fn no_limit(&self) -> &Self {
        self.inner.state.write().limit = None;
        self
    }

    /// Lets write paths run a sweep themselves, at most once per `window`.
    pub fn sweep_throttle(&self, window: Duration) -> &Self {
        self.inner.state.write().throttle = Some(window);
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.inner.state.read().limit
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// Rewriting a live key never shortens its TTL: the longer of the old
    /// and new TTL is kept, and `NO_EXPIRE` beats any duration.
    pub fn set(&self, key: K, value: V, ttl: impl Into<Ttl>) {
        let now = Instant::now();
        let mut state = self.inner.state.write();
        state.store(key, Some(value), None, ttl.into(), now);
        self.after_write(&mut state, now);
    }

    // == Set Err ==
    /// Memoizes a failure under `key` and returns it.
    ///
    /// Readers get the error back until the TTL lapses or the key is
    /// rewritten, so a failed computation is not retried within the window.
    pub fn set_err<E>(&self, key: K, value: Option<V>, err: E, ttl: impl Into<Ttl>) -> CacheError
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let err = CacheError::cached(err);
        let now = Instant::now();
        let mut state = self.inner.state.write();
        state.store(key, value, Some(err.clone()), ttl.into(), now);
        self.after_write(&mut state, now);
        err
    }

    // == Get ==
    /// Returns the live value for `key`; None if missing, expired, or
    /// holding a cached error.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_err(key).ok()
    }

    pub fn get_with<Q>(&self, key: &Q, options: ReadOptions) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_err_with(key, options).ok()
    }

    // == Get Err ==
    /// Returns the value, or `NotFound`, `Expired` or the cached error.
    pub fn get_err<Q>(&self, key: &Q) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_err_with(key, ReadOptions::NONE)
    }

    pub fn get_err_with<Q>(&self, key: &Q, options: ReadOptions) -> Result<V, CacheError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let result = if options.extends() {
            let mut state = self.inner.state.write();
            state.entry_mut(key, now).and_then(|entry| {
                options.apply(entry, now);
                entry.result()
            })
        } else {
            self.inner
                .state
                .read()
                .entry(key, now)
                .and_then(|entry| entry.result())
        };

        match &result {
            Ok(_) => self.inner.stats.record_hit(),
            Err(CacheError::Cached(_)) => self.inner.stats.record_cached_error(),
            Err(CacheError::Expired) => {
                self.inner.stats.record_miss();
                self.purge_expired(key);
            }
            Err(CacheError::NotFound) => self.inner.stats.record_miss(),
        }

        result
    }

    // == Exists ==
    /// True iff a live entry is present, whether or not it holds an error.
    pub fn exists<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.exists_with(key, ReadOptions::NONE)
    }

    pub fn exists_with<Q>(&self, key: &Q, options: ReadOptions) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let found = if options.extends() {
            let mut state = self.inner.state.write();
            state
                .entry_mut(key, now)
                .map(|entry| options.apply(entry, now))
        } else {
            self.inner.state.read().entry(key, now).map(|_| ())
        };

        if let Err(CacheError::Expired) = found {
            self.purge_expired(key);
        }

        found.is_ok()
    }

    // == Get Set ==
    /// Returns the live value for `key`, or stores and returns `value`.
    ///
    /// Runs entirely under the exclusive lock. A live cached error is
    /// returned as `Err` and left in place.
    pub fn get_set(&self, key: K, value: V, ttl: impl Into<Ttl>) -> Result<V, CacheError> {
        self.get_set_with(key, value, ttl, ReadOptions::NONE)
    }

    /// Like [`Cache::get_set`], applying `options` to an entry that is
    /// already live.
    pub fn get_set_with(
        &self,
        key: K,
        value: V,
        ttl: impl Into<Ttl>,
        options: ReadOptions,
    ) -> Result<V, CacheError> {
        let now = Instant::now();
        let mut state = self.inner.state.write();

        if let Ok(entry) = state.entry_mut(&key, now) {
            options.apply(entry, now);
            let existing = entry.result();
            match &existing {
                Ok(_) => self.inner.stats.record_hit(),
                Err(_) => self.inner.stats.record_cached_error(),
            }
            return existing;
        }

        self.inner.stats.record_miss();
        state.store(key, Some(value.clone()), None, ttl.into(), now);
        self.after_write(&mut state, now);
        Ok(value)
    }

    // == Unique Set ==
    /// Stores `value` only if no live entry exists; true if it was stored.
    pub fn unique_set(&self, key: K, value: V, ttl: impl Into<Ttl>) -> bool {
        self.unique_set_with(key, value, ttl, ReadOptions::NONE)
    }

    /// Like [`Cache::unique_set`], applying `options` to the live entry that
    /// blocked the write.
    pub fn unique_set_with(
        &self,
        key: K,
        value: V,
        ttl: impl Into<Ttl>,
        options: ReadOptions,
    ) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.write();

        if let Ok(entry) = state.entry_mut(&key, now) {
            options.apply(entry, now);
            return false;
        }

        state.store(key, Some(value), None, ttl.into(), now);
        self.after_write(&mut state, now);
        true
    }

    // == Remove ==
    /// Deletes `key`; returns whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.state.write().remove(key).is_some()
    }

    // == Clear ==
    pub fn clear(&self) {
        let mut state = self.inner.state.write();
        state.items.clear();
        state.order.clear();
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().items.is_empty()
    }

    // == Check ==
    /// Removes expired entries, then evicts the oldest insertions until the
    /// cache is within its limit.
    pub fn check(&self) -> SweepOutcome {
        self.inner.sweep()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    fn after_write(&self, state: &mut State<K, V>, now: Instant) {
        if let Some(outcome) = state.maybe_sweep(now) {
            self.inner.record(outcome);
        }
    }

    /// Drops `key` if it is still expired once the write lock is held.
    fn purge_expired<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.inner.state.write();
        let expired = state
            .items
            .get(key)
            .is_some_and(|entry| entry.is_expired());

        if expired {
            state.remove(key);
            self.inner.stats.record_expired(1);
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Serialize,
{
    // == Get Items ==
    /// JSON-serializes every live value independently, oldest first.
    ///
    /// A value that fails to serialize is logged and left out.
    pub fn get_items(&self) -> Vec<Vec<u8>> {
        self.inner.items()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    // == Keeper ==
    /// Registers this cache with `keeper` for periodic sweeping.
    pub fn keeper(&self, keeper: &Keeper) -> &Self {
        keeper.add(self.handle());
        self
    }

    /// Weak handle a keeper can hold without keeping the cache alive.
    pub fn handle(&self) -> Weak<dyn Sweep> {
        let weak: Weak<Inner<K, V>> = Arc::downgrade(&self.inner);
        weak
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NO_EXPIRE;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::{self, sleep};

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn new_cache<V: Clone>() -> Cache<String, V> {
        Cache::new(CancellationToken::new())
    }

    #[test]
    fn test_cache_new() {
        let cache = new_cache::<i32>();
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.limit(), Some(DEFAULT_LIMIT));
    }

    #[test]
    fn test_set_and_get() {
        let cache = new_cache();

        cache.set("key1".to_string(), "value1".to_string(), NO_EXPIRE);

        assert_eq!(cache.get("key1"), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let cache = new_cache::<i32>();

        assert_eq!(cache.get("nonexistent"), None);
        assert!(matches!(cache.get_err("nonexistent"), Err(CacheError::NotFound)));
    }

    #[test]
    fn test_expired_without_check() {
        let cache = new_cache();

        cache.set("a".to_string(), "x".to_string(), ms(10));
        assert!(cache.exists("a"));

        sleep(ms(20));

        assert!(matches!(cache.get_err("a"), Err(CacheError::Expired)));
        assert!(!cache.exists("a"));
        assert_eq!(cache.len(), 0, "Expired entry should be purged on read");
    }

    #[test]
    fn test_no_expire_persists() {
        let cache = new_cache();

        cache.set("forever".to_string(), 7, NO_EXPIRE);
        sleep(ms(30));
        cache.check();

        assert_eq!(cache.get("forever"), Some(7));
    }

    #[test]
    fn test_overwrite_keeps_longer_ttl() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, NO_EXPIRE);
        cache.set("k".to_string(), 2, ms(10));
        sleep(ms(20));

        assert_eq!(cache.get("k"), Some(2), "NO_EXPIRE should survive a shorter rewrite");
    }

    #[test]
    fn test_overwrite_extends_to_longer_ttl() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, ms(10));
        cache.set("k".to_string(), 2, Duration::from_secs(60));
        sleep(ms(20));

        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_expired_entry_does_not_merge_ttl() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, Duration::from_millis(5));
        sleep(ms(15));
        cache.set("k".to_string(), 2, ms(10));
        sleep(ms(20));

        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_set_clears_cached_error() {
        let cache = new_cache();

        cache.set_err("k".to_string(), None, "boom", NO_EXPIRE);
        cache.set("k".to_string(), 5, NO_EXPIRE);

        assert_eq!(cache.get_err("k").unwrap(), 5);
    }

    #[test]
    fn test_error_memoization() {
        let cache = new_cache::<String>();

        let returned = cache.set_err("svc".to_string(), None, "upstream down", ms(20));
        assert_eq!(returned.to_string(), "upstream down");

        let err = cache.get_err("svc").unwrap_err();
        assert!(err.is_cached());
        assert_eq!(err.to_string(), "upstream down");
        assert_eq!(cache.get("svc"), None);
        assert!(cache.exists("svc"), "Errored entry still exists");

        sleep(ms(30));

        assert!(matches!(cache.get_err("svc"), Err(CacheError::Expired)));
    }

    #[test]
    fn test_error_with_value_still_hides_value() {
        let cache = new_cache();

        cache.set_err("k".to_string(), Some(1), "partial", NO_EXPIRE);

        assert_eq!(cache.get("k"), None);
        assert!(cache.get_err("k").unwrap_err().is_cached());
    }

    #[test]
    fn test_get_set_returns_first_value() {
        let cache = new_cache();

        assert_eq!(cache.get_set("k".to_string(), "v1", NO_EXPIRE).unwrap(), "v1");
        assert_eq!(cache.get_set("k".to_string(), "v2", NO_EXPIRE).unwrap(), "v1");
        assert_eq!(cache.get("k"), Some("v1"));
    }

    #[test]
    fn test_get_set_replaces_expired() {
        let cache = new_cache();

        cache.set("k".to_string(), "old", ms(5));
        sleep(ms(15));

        assert_eq!(cache.get_set("k".to_string(), "new", NO_EXPIRE).unwrap(), "new");
    }

    #[test]
    fn test_get_set_keeps_cached_error() {
        let cache = new_cache();

        cache.set_err("k".to_string(), None, "failed", NO_EXPIRE);

        let result = cache.get_set("k".to_string(), 1, NO_EXPIRE);
        assert!(result.unwrap_err().is_cached());
        assert!(cache.get_err("k").unwrap_err().is_cached());
    }

    #[test]
    fn test_unique_set() {
        let cache = new_cache();

        assert!(cache.unique_set("k".to_string(), 1, NO_EXPIRE));
        assert!(!cache.unique_set("k".to_string(), 2, NO_EXPIRE));
        assert_eq!(cache.get("k"), Some(1));

        cache.set_err("e".to_string(), None, "failed", NO_EXPIRE);
        assert!(!cache.unique_set("e".to_string(), 3, NO_EXPIRE));
    }

    #[test]
    fn test_remove() {
        let cache = new_cache();

        cache.set("key1".to_string(), 1, NO_EXPIRE);

        assert!(cache.remove("key1"));
        assert!(!cache.remove("key1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = new_cache();
        cache.set("a".to_string(), 1, NO_EXPIRE);
        cache.set("b".to_string(), 2, NO_EXPIRE);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get_items().is_empty());
    }

    #[test]
    fn test_check_enforces_limit() {
        let cache = new_cache();
        cache.set_limit(2);

        cache.set("a".to_string(), 1, NO_EXPIRE);
        cache.set("b".to_string(), 2, NO_EXPIRE);
        cache.set("c".to_string(), 3, NO_EXPIRE);
        assert_eq!(cache.len(), 3, "Limit is enforced by sweeps, not writes");

        let outcome = cache.check();

        assert_eq!(cache.len(), 2);
        assert_eq!(outcome.evicted, 1);
    }

    #[test]
    fn test_eviction_is_fifo() {
        let cache = new_cache();
        cache.set_limit(2);

        cache.set("a".to_string(), 1, NO_EXPIRE);
        cache.set("b".to_string(), 2, NO_EXPIRE);
        cache.set("a".to_string(), 10, NO_EXPIRE);
        cache.set("c".to_string(), 3, NO_EXPIRE);
        cache.check();

        assert_eq!(cache.get("a"), None, "Rewrite keeps first-insertion position");
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_no_limit() {
        let cache = new_cache();
        cache.set_limit(1).no_limit();

        for i in 0..10 {
            cache.set(format!("k{}", i), i, NO_EXPIRE);
        }
        cache.check();

        assert_eq!(cache.len(), 10);
        assert_eq!(cache.limit(), None);
    }

    #[test]
    fn test_bulk_insert_unbounded() {
        let cache: Cache<u32, u32> = Cache::new(CancellationToken::new());
        cache.no_limit();

        let start = Instant::now();
        for i in 0..100_000 {
            cache.set(i, i, NO_EXPIRE);
        }
        let elapsed = start.elapsed();

        assert_eq!(cache.len(), 100_000);
        assert_eq!(cache.get(&99_999u32), Some(99_999));
        assert!(
            elapsed < Duration::from_secs(5),
            "Inserting fresh keys should not scan the order, took {:?}",
            elapsed
        );

        cache.set_limit(3);
        cache.check();
        let mut survivors: Vec<u32> = (0..100_000u32).filter(|i| cache.exists(i)).collect();
        survivors.sort_unstable();
        assert_eq!(survivors, vec![99_997, 99_998, 99_999]);
    }

    #[test]
    fn test_rewrite_of_unswept_expired_key_moves_to_back() {
        let cache = new_cache();
        cache.set_limit(2);

        cache.set("a".to_string(), 1, ms(5));
        cache.set("b".to_string(), 2, NO_EXPIRE);
        sleep(ms(15));
        cache.set("a".to_string(), 10, NO_EXPIRE);
        cache.set("c".to_string(), 3, NO_EXPIRE);

        let outcome = cache.check();

        assert_eq!(outcome, SweepOutcome { expired: 0, evicted: 1 });
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get_items().len(), 2, "Key must appear once in the order");
    }

    #[test]
    fn test_check_removes_expired_first() {
        let cache = new_cache();
        cache.set_limit(2);

        cache.set("old".to_string(), 1, ms(5));
        cache.set("b".to_string(), 2, NO_EXPIRE);
        cache.set("c".to_string(), 3, NO_EXPIRE);
        sleep(ms(15));

        let outcome = cache.check();

        assert_eq!(outcome, SweepOutcome { expired: 1, evicted: 0 });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reset_timer_extends_entry() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, ms(100));
        sleep(ms(60));
        assert_eq!(cache.get_with("k", ReadOptions::RESET_TIMER), Some(1));
        sleep(ms(60));

        assert_eq!(cache.get("k"), Some(1), "Reset should have pushed expiry back");
    }

    #[test]
    fn test_default_read_does_not_extend() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, ms(100));
        sleep(ms(60));
        assert_eq!(cache.get("k"), Some(1));
        sleep(ms(60));

        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_reset_timer_on_err_only_touches_errors() {
        let cache = new_cache::<i32>();

        cache.set("ok".to_string(), 1, ms(100));
        cache.set_err("bad".to_string(), None, "failed", ms(100));
        sleep(ms(60));

        assert!(cache.exists_with("ok", ReadOptions::RESET_TIMER_ON_ERR));
        assert!(cache.exists_with("bad", ReadOptions::RESET_TIMER_ON_ERR));
        sleep(ms(60));

        assert!(!cache.exists("ok"));
        assert!(cache.exists("bad"));
    }

    #[test]
    fn test_reset_timer_skips_errors() {
        let cache = new_cache::<i32>();

        cache.set_err("bad".to_string(), None, "failed", ms(100));
        sleep(ms(60));
        let _ = cache.get_err_with("bad", ReadOptions::RESET_TIMER);
        sleep(ms(60));

        assert!(matches!(cache.get_err("bad"), Err(CacheError::Expired)));
    }

    #[test]
    fn test_get_set_with_reset_timer_extends_existing() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, ms(100));
        sleep(ms(60));
        let got = cache.get_set_with("k".to_string(), 2, ms(100), ReadOptions::RESET_TIMER);
        assert_eq!(got.unwrap(), 1);
        sleep(ms(60));

        assert_eq!(cache.get("k"), Some(1), "Reset should have pushed expiry back");
    }

    #[test]
    fn test_get_set_without_reset_does_not_extend() {
        let cache = new_cache();

        cache.set("k".to_string(), 1, ms(100));
        sleep(ms(60));
        assert_eq!(cache.get_set("k".to_string(), 2, ms(100)).unwrap(), 1);
        sleep(ms(60));

        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_unique_set_with_reset_timer_on_err() {
        let cache = new_cache::<i32>();

        cache.set_err("bad".to_string(), None, "failed", ms(100));
        sleep(ms(60));
        assert!(!cache.unique_set_with(
            "bad".to_string(),
            1,
            ms(100),
            ReadOptions::RESET_TIMER_ON_ERR
        ));
        sleep(ms(60));

        assert!(cache.get_err("bad").unwrap_err().is_cached());
    }

    #[test]
    fn test_sweep_throttle_runs_on_write() {
        let cache = new_cache();
        cache.set_limit(1).sweep_throttle(ms(50));

        cache.set("a".to_string(), 1, NO_EXPIRE);
        cache.set("b".to_string(), 2, NO_EXPIRE);
        assert_eq!(cache.len(), 2, "Window has not passed yet");

        sleep(ms(60));
        cache.set("c".to_string(), 3, NO_EXPIRE);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_get_items_live_values_in_order() {
        let cache = new_cache();

        cache.set("a".to_string(), "first".to_string(), NO_EXPIRE);
        cache.set("gone".to_string(), "expired".to_string(), ms(5));
        cache.set_err("err".to_string(), None, "failed", NO_EXPIRE);
        cache.set("b".to_string(), "second".to_string(), NO_EXPIRE);
        sleep(ms(15));

        let items = cache.get_items();

        assert_eq!(items, vec![b"\"first\"".to_vec(), b"\"second\"".to_vec()]);
    }

    #[test]
    fn test_get_items_skips_unserializable() {
        // Maps with non-string keys cannot be encoded as JSON objects.
        let cache: Cache<String, HashMap<(i32, i32), i32>> = new_cache();
        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);

        cache.set("bad".to_string(), bad, NO_EXPIRE);
        cache.set("good".to_string(), HashMap::new(), NO_EXPIRE);

        let items = cache.get_items();

        assert_eq!(items, vec![b"{}".to_vec()]);
    }

    #[test]
    fn test_stats_counts_lookups() {
        let cache = Cache::named(CancellationToken::new(), "lookups");

        cache.set("k".to_string(), 1, NO_EXPIRE);
        cache.set_err("e".to_string(), None, "failed", NO_EXPIRE);
        cache.get("k");
        cache.get("missing");
        cache.get("e");

        let stats = cache.stats();
        assert_eq!(stats.name.as_deref(), Some("lookups"));
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.cached_errors, 1);
        assert_eq!(stats.total_entries, 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = new_cache();
        let other = cache.clone();

        cache.set("k".to_string(), 1, NO_EXPIRE);

        assert_eq!(other.get("k"), Some(1));
    }

    #[test]
    fn test_cancelled_cache_stays_usable() {
        let token = CancellationToken::new();
        let cache: Cache<String, i32> = Cache::new(token.clone());

        token.cancel();
        cache.set("k".to_string(), 1, NO_EXPIRE);

        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_concurrent_access() {
        let cache: Cache<String, usize> = new_cache();
        cache.set_limit(50);
        let reads = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                let reads = Arc::clone(&reads);
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}", (t * 31 + i) % 97);
                        match i % 4 {
                            0 => cache.set(key, i, ms(50)),
                            1 => {
                                if cache.get(&key).is_some() {
                                    reads.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            2 => {
                                cache.remove(&key);
                            }
                            _ => {
                                cache.check();
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker should not panic");
        }

        cache.check();
        assert!(cache.len() <= 50);
        assert_eq!(cache.stats().total_entries, cache.len());
    }
}
