//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::{Ttl, NO_EXPIRE};

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store
/// - `ttl`: Optional TTL in seconds, 0 = never expire (uses default if not specified)
/// - `error`: Optional failure to memoize instead of a plain value
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    #[serde(default)]
    pub value: String,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Optional failure message to cache
    #[serde(default)]
    pub error: Option<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        if self.value.len() > MAX_VALUE_SIZE {
            return Some(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            ));
        }
        if matches!(&self.error, Some(error) if error.is_empty()) {
            return Some("Error message cannot be empty".to_string());
        }
        None
    }

    /// TTL requested by the client, or `default` when none was given.
    pub fn ttl_or(&self, default: Ttl) -> Ttl {
        match self.ttl {
            None => default,
            Some(0) => NO_EXPIRE,
            Some(secs) => Ttl::After(Duration::from_secs(secs)),
        }
    }
}
