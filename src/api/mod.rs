//! API Module
//!
//! HTTP handlers and routing for the cache diagnostics API.
//!
//! # Endpoints
//! - `PUT /set` - Store a value, or memoize an error
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /exists/:key` - Check whether a live entry exists
//! - `DELETE /del/:key` - Delete a key
//! - `GET /stats` - Get cache statistics
//! - `GET /caches` - Dump every cache registered with the keeper
//! - `POST /sweep` - Run one keeper sweep now
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
