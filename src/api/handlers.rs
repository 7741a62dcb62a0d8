//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::cache::{Cache, Ttl};
use crate::config::Config;
use crate::error::{ApiError, CacheError, Result};
use crate::keeper::Keeper;
use crate::models::{
    CachesResponse, DeleteResponse, ExistsResponse, GetResponse, HealthResponse, SetRequest,
    SetResponse, StatsResponse, SweepResponse,
};

/// Application state shared across all handlers.
///
/// Both handles are cheap clones of shared state; the cache locks itself.
#[derive(Clone)]
pub struct AppState {
    /// Cache served over HTTP
    pub cache: Cache<String, String>,
    /// Keeper the cache is registered with
    pub keeper: Keeper,
    /// TTL applied when a request carries none
    pub default_ttl: Ttl,
}

impl AppState {
    /// Creates a new AppState from its parts.
    pub fn new(cache: Cache<String, String>, keeper: Keeper, default_ttl: Ttl) -> Self {
        Self {
            cache,
            keeper,
            default_ttl,
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// The cache is created through `keeper`, so it picks up the configured
    /// limit and is swept with every other registered cache.
    pub fn from_config(config: &Config, keeper: &Keeper, token: CancellationToken) -> Self {
        let cache = keeper.cache(token);
        Self::new(cache, keeper.clone(), config.default_ttl())
    }
}

/// Handler for PUT /set
///
/// Stores a value, or memoizes the request's error, under its key.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(ApiError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl_or(state.default_ttl);
    let memoized = match req.error {
        Some(error) => {
            let value = (!req.value.is_empty()).then_some(req.value);
            state.cache.set_err(req.key.clone(), value, error, ttl);
            true
        }
        None => {
            state.cache.set(req.key.clone(), req.value, ttl);
            false
        }
    };

    Ok(Json(SetResponse::new(req.key, memoized)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. A memoized error is returned
/// as the response error.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state.cache.get_err(&key)?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for GET /exists/:key
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ExistsResponse> {
    let exists = state.cache.exists(&key);

    Json(ExistsResponse { key, exists })
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if !state.cache.remove(&key) {
        return Err(CacheError::NotFound.into());
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /stats
///
/// Returns statistics for the cache served over HTTP.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().into())
}

/// Handler for GET /caches
///
/// Dumps the live values of every cache registered with the keeper.
pub async fn caches_handler(State(state): State<AppState>) -> Json<CachesResponse> {
    Json(CachesResponse::from_items(state.keeper.get_items()))
}

/// Handler for POST /sweep
///
/// Runs one keeper pass immediately.
pub async fn sweep_handler(State(state): State<AppState>) -> Json<SweepResponse> {
    Json(SweepResponse {
        report: state.keeper.sweep(),
    })
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.keeper.is_running()))
}
