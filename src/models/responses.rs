//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::keeper::SweepReport;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: String,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
    /// Whether a failure was memoized instead of a value
    pub memoized_error: bool,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>, memoized_error: bool) -> Self {
        let key = key.into();
        let message = if memoized_error {
            format!("Error for key '{}' cached successfully", key)
        } else {
            format!("Key '{}' set successfully", key)
        };
        Self {
            message,
            key,
            memoized_error,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for the EXISTS operation (GET /exists/:key)
#[derive(Debug, Clone, Serialize)]
pub struct ExistsResponse {
    pub key: String,
    pub exists: bool,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate ((hits + cached errors) / lookups)
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the keeper dump (GET /caches)
#[derive(Debug, Clone, Serialize)]
pub struct CachesResponse {
    /// Live values of every registered cache, one list per cache
    pub caches: Vec<Vec<Value>>,
}

impl CachesResponse {
    /// Decodes the keeper's serialized snapshots back into JSON values.
    ///
    /// Blobs that do not decode are left out of their cache's list.
    pub fn from_items(items: Vec<Vec<Vec<u8>>>) -> Self {
        let caches = items
            .into_iter()
            .map(|cache| {
                cache
                    .iter()
                    .filter_map(|blob| serde_json::from_slice(blob).ok())
                    .collect()
            })
            .collect();
        Self { caches }
    }
}

/// Response body for a manual keeper pass (POST /sweep)
#[derive(Debug, Clone, Serialize)]
pub struct SweepResponse {
    #[serde(flatten)]
    pub report: SweepReport,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Whether the keeper's sweep task is running
    pub sweeping: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(sweeping: bool) -> Self {
        Self {
            status: "healthy".to_string(),
            sweeping,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
