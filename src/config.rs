//! Configuration Module
//!
//! Handles loading keeper and server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{Ttl, DEFAULT_DURATION, DEFAULT_LIMIT, NO_EXPIRE};

/// Keeper and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between keeper sweeps
    pub sweep_interval: u64,
    /// Entry limit for caches created by the keeper, 0 = unbounded
    pub cache_limit: usize,
    /// Minimum milliseconds between write-triggered sweeps, 0 = disabled
    pub sweep_throttle_ms: u64,
    /// Default TTL in seconds for entries set over HTTP, 0 = never expire
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEP_INTERVAL` - Keeper sweep frequency in seconds (default: 60)
    /// - `CACHE_LIMIT` - Entries per cache, 0 for no limit (default: 2000)
    /// - `SWEEP_THROTTLE_MS` - Write-triggered sweep window, 0 disables (default: 0)
    /// - `DEFAULT_TTL` - Default TTL in seconds, 0 for none (default: 900)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// A `SWEEP_INTERVAL` of 0 falls back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            cache_limit: env_or("CACHE_LIMIT", defaults.cache_limit),
            sweep_throttle_ms: env_or("SWEEP_THROTTLE_MS", defaults.sweep_throttle_ms),
            default_ttl: env_or("DEFAULT_TTL", defaults.default_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
        .normalized()
    }

    /// Replaces values that would make the keeper spin with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.sweep_interval == 0 {
            self.sweep_interval = Self::default().sweep_interval;
        }
        self
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn limit(&self) -> Option<usize> {
        (self.cache_limit > 0).then_some(self.cache_limit)
    }

    pub fn sweep_throttle(&self) -> Option<Duration> {
        (self.sweep_throttle_ms > 0).then(|| Duration::from_millis(self.sweep_throttle_ms))
    }

    pub fn default_ttl(&self) -> Ttl {
        if self.default_ttl == 0 {
            NO_EXPIRE
        } else {
            Ttl::After(Duration::from_secs(self.default_ttl))
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: 60,
            cache_limit: DEFAULT_LIMIT,
            sweep_throttle_ms: 0,
            default_ttl: DEFAULT_DURATION.as_secs(),
            server_port: 3000,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
