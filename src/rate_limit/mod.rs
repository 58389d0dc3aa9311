//! Rate Limiting Module
//!
//! Fixed-window request limits per policy and client identity.

mod identity;
mod limiter;
mod policy;
mod window;

pub use identity::{client_address, route_scoped, KeyGenerator, UNKNOWN_CLIENT};
pub use limiter::{RateLimitDecision, RateLimiter, RATE_LIMIT_SEGMENT};
pub use policy::RateLimitPolicy;
pub use window::{LocalWindows, RateWindow};
