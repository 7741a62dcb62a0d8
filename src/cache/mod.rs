//! Cache Module
//!
//! Provides typed in-memory caches with TTL expiration, memoized errors and
//! FIFO size eviction.

use std::time::Duration;

mod entry;
mod order;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, Ttl};
pub use order::InsertionOrder;
pub use stats::{CacheStats, StatsCounters};
pub use store::{Cache, ReadOptions, SweepOutcome};

// == Public Constants ==
/// Entry limit given to new caches
pub const DEFAULT_LIMIT: usize = 2000;

/// TTL that disables time-based expiry for one entry
pub const NO_EXPIRE: Ttl = Ttl::Never;

pub const SHORT_DURATION: Duration = Duration::from_secs(5 * 60);
pub const TEN_MINUTE_DURATION: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(15 * 60);
pub const HOUR_DURATION: Duration = Duration::from_secs(60 * 60);
pub const HALF_DAY_DURATION: Duration = Duration::from_secs(12 * 60 * 60);
pub const FULL_DAY_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
