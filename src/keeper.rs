//! Cache Keeper
//!
//! Registry that sweeps many caches from one background task.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheStats, SweepOutcome, DEFAULT_LIMIT};
use crate::config::Config;
use crate::tasks::spawn_sweep_task;

/// Default time between keeper sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// == Sweep ==
/// What a keeper needs from a registered cache.
///
/// Implemented by every [`Cache`] whose values are serializable; any other
/// type can join a keeper by implementing it and registering an
/// `Arc::downgrade` of itself.
pub trait Sweep: Send + Sync {
    /// Drops expired entries and enforces the size bound.
    fn check(&self) -> SweepOutcome;

    /// True once the owner's token is cancelled; the keeper then forgets
    /// the cache without sweeping it.
    fn is_done(&self) -> bool;

    /// Serialized live values for diagnostics.
    fn items(&self) -> Vec<Vec<u8>>;

    fn stats(&self) -> CacheStats;
}

// == Sweep Report ==
/// Result of one keeper pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Caches that were checked
    pub swept: usize,
    /// Handles forgotten because the cache was cancelled or dropped
    pub dropped: usize,
    /// Entries expired across all caches
    pub expired: usize,
    /// Entries evicted across all caches
    pub evicted: usize,
}

// == Registry ==
/// Weak handles to registered caches.
///
/// The lock only guards the list; it is released before any cache is
/// checked, serialized or asked for stats.
#[derive(Default)]
pub struct Registry {
    caches: Mutex<Vec<Weak<dyn Sweep>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: Weak<dyn Sweep>) {
        self.caches.lock().push(handle);
    }

    pub fn len(&self) -> usize {
        self.caches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.lock().is_empty()
    }

    /// Live caches, without touching the registry.
    fn live(&self) -> Vec<Arc<dyn Sweep>> {
        self.caches
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|cache| !cache.is_done())
            .collect()
    }

    /// Forgets dropped and cancelled caches; returns the survivors and how
    /// many handles were forgotten.
    fn prune(&self) -> (Vec<Arc<dyn Sweep>>, usize) {
        let mut caches = self.caches.lock();
        let before = caches.len();
        let mut live = Vec::with_capacity(before);

        caches.retain(|handle| match handle.upgrade() {
            Some(cache) if !cache.is_done() => {
                live.push(cache);
                true
            }
            _ => false,
        });

        let dropped = before - caches.len();
        (live, dropped)
    }

    // == Sweep ==
    /// One pass: prune under the lock, then check every survivor outside it.
    pub fn sweep(&self) -> SweepReport {
        let (live, dropped) = self.prune();
        if dropped > 0 {
            info!("Keeper sweep: forgot {} cancelled or dropped caches", dropped);
        }

        let mut report = SweepReport {
            swept: live.len(),
            dropped,
            ..SweepReport::default()
        };

        for cache in live {
            let outcome = cache.check();
            report.expired += outcome.expired;
            report.evicted += outcome.evicted;
        }

        debug!(
            swept = report.swept,
            expired = report.expired,
            evicted = report.evicted,
            "Keeper sweep complete"
        );
        report
    }

    pub fn get_items(&self) -> Vec<Vec<Vec<u8>>> {
        self.live().iter().map(|cache| cache.items()).collect()
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.live().iter().map(|cache| cache.stats()).collect()
    }
}

// == Keeper ==
struct Runner {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared sweeper for many caches.
///
/// Construct one at startup, register caches with [`Cache::keeper`] or
/// create them through [`Keeper::cache`], then [`Keeper::start`] the
/// background task. Clones share the same registry and task.
#[derive(Clone)]
pub struct Keeper {
    registry: Arc<Registry>,
    interval: Duration,
    default_limit: Option<usize>,
    sweep_throttle: Option<Duration>,
    runner: Arc<Mutex<Option<Runner>>>,
}

impl Default for Keeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Keeper {
    // == Constructors ==
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SWEEP_INTERVAL)
    }

    /// Creates a keeper sweeping every `interval`. A zero interval falls
    /// back to [`DEFAULT_SWEEP_INTERVAL`].
    pub fn with_interval(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Zero keeper sweep interval, using {:?}", DEFAULT_SWEEP_INTERVAL);
            DEFAULT_SWEEP_INTERVAL
        } else {
            interval
        };

        Self {
            registry: Arc::new(Registry::new()),
            interval,
            default_limit: Some(DEFAULT_LIMIT),
            sweep_throttle: None,
            runner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            default_limit: config.limit(),
            sweep_throttle: config.sweep_throttle(),
            ..Self::with_interval(config.sweep_interval())
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // == Registration ==
    /// Registers a cache handle. Registering the same cache twice only
    /// means it is checked twice per pass.
    pub fn add(&self, handle: Weak<dyn Sweep>) {
        self.registry.add(handle);
    }

    /// Creates a cache with this keeper's defaults and registers it.
    pub fn cache<K, V>(&self, token: CancellationToken) -> Cache<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Serialize + Send + Sync + 'static,
    {
        let cache = Cache::new(token);
        match self.default_limit {
            Some(limit) => cache.set_limit(limit),
            None => cache.no_limit(),
        };
        if let Some(window) = self.sweep_throttle {
            cache.sweep_throttle(window);
        }
        cache.keeper(self);
        cache
    }

    /// Number of registered handles, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    // == Sweep ==
    /// Runs one pass now, independent of the background task.
    pub fn sweep(&self) -> SweepReport {
        self.registry.sweep()
    }

    // == Diagnostics ==
    /// Serialized live values of every live cache.
    pub fn get_items(&self) -> Vec<Vec<Vec<u8>>> {
        self.registry.get_items()
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.registry.stats()
    }

    // == Lifecycle ==
    /// Spawns the sweep task; it exits when `shutdown` or [`Keeper::stop`]
    /// fires. Returns false if the task is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, shutdown: &CancellationToken) -> bool {
        let mut runner = self.runner.lock();
        if runner.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }

        let stop = shutdown.child_token();
        let handle = spawn_sweep_task(Arc::clone(&self.registry), self.interval, stop.clone());
        *runner = Some(Runner { stop, handle });
        true
    }

    pub fn is_running(&self) -> bool {
        self.runner
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Stops the sweep task and waits for it to exit.
    pub async fn stop(&self) {
        let runner = self.runner.lock().take();
        let Some(runner) = runner else {
            return;
        };

        runner.stop.cancel();
        if let Err(err) = runner.handle.await {
            warn!("Keeper sweep task ended abnormally: {}", err);
        }
    }
}
