//! API Module
//!
//! HTTP handlers and routing for the cache ops server.
//!
//! # Endpoints
//! - `GET /health` - Health check, never rate limited
//! - `GET /stats` - Backend mode and per-namespace statistics
//! - `GET|PUT|DELETE /cache/:namespace/:key` - Single entry access
//! - `DELETE /cache/:namespace` - Clear a namespace
//! - `POST /invalidate/events/:id` - Drop everything derived from an event
//! - `POST /invalidate/users/:id` - Drop everything derived from a member

pub mod handlers;
pub mod rate_limit;
pub mod routes;

pub use handlers::*;
pub use rate_limit::{enforce_rate_limit, RateLimited};
pub use routes::create_router;
