//! Cache Keeper - typed in-process TTL caches with a shared sweeper
//!
//! Provides caches with per-entry TTL, memoized errors and a size bound,
//! plus a keeper that sweeps many caches from one background task.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod keeper;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, ReadOptions, Ttl, NO_EXPIRE};
pub use config::Config;
pub use error::CacheError;
pub use keeper::{Keeper, Sweep};
pub use tasks::spawn_sweep_task;
