//! Request and Response models for the cache ops API
//!
//! DTOs serialized to and from HTTP bodies.

pub mod requests;
pub mod responses;

pub use requests::SetRequest;
pub use responses::{
    ClearResponse, DeleteResponse, ErrorResponse, GetResponse, HealthResponse,
    InvalidateResponse, NamespaceStats, RateLimitedResponse, SetResponse, StatsResponse,
};
