//! Club Cache - Namespaced caching and rate limiting for the club platform
//!
//! A distributed key-value store when one is configured, an in-process map
//! otherwise. Store failures never reach callers: reads degrade to misses,
//! writes to no-ops, and rate-limit checks to per-process windows.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod keys;
pub mod models;
pub mod rate_limit;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, Lookup, Namespace, NamespaceCache};
pub use config::Config;
pub use error::{CacheError, Result, StoreError};
pub use invalidation::{InvalidationReport, Invalidator};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use tasks::spawn_cleanup_task;
