//! Response DTOs for the cache ops API

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{BackendKind, CacheStats};
use crate::invalidation::InvalidationReport;
use crate::rate_limit::RateLimitDecision;

/// Response body for `GET /cache/:namespace/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub namespace: String,
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
            value,
        }
    }
}

/// Response body for `PUT /cache/:namespace/:key`
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
    /// TTL applied, in seconds
    pub ttl: u64,
}

impl SetResponse {
    pub fn new(namespace: &str, key: impl Into<String>, ttl: u64) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{key}' set in '{namespace}'"),
            key,
            ttl,
        }
    }
}

/// Response body for `DELETE /cache/:namespace/:key`
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// Whether a live entry was removed
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Response body for `DELETE /cache/:namespace`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub namespace: String,
    pub removed: usize,
}

/// Statistics of one namespace.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub name: String,
    /// Live entries
    pub size: usize,
    /// Default TTL in seconds
    pub default_ttl: u64,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl NamespaceStats {
    pub fn new(name: impl Into<String>, size: usize, default_ttl: u64, stats: CacheStats) -> Self {
        Self {
            name: name.into(),
            size,
            default_ttl,
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub backend: BackendKind,
    pub disabled: bool,
    pub rate_limit_backend: BackendKind,
    pub namespaces: Vec<NamespaceStats>,
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for the `POST /invalidate/...` endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub entity: String,
    pub id: String,
    #[serde(flatten)]
    pub report: InvalidationReport,
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body of a `429 Too Many Requests` response.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitedResponse {
    pub error: String,
    pub policy: String,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
    /// Seconds until the window ends
    pub retry_after: u64,
}

impl RateLimitedResponse {
    pub fn new(policy: &str, decision: &RateLimitDecision, retry_after: u64) -> Self {
        Self {
            error: "Too many requests".to_string(),
            policy: policy.to_string(),
            limit: decision.limit,
            reset_at: decision.reset_at(),
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_response_keeps_json_value() {
        let resp = GetResponse::new("event", "detail:1", serde_json::json!({"id": 1}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["value"]["id"], 1);
        assert_eq!(json["namespace"], "event");
    }

    #[test]
    fn test_set_response_message() {
        let resp = SetResponse::new("user", "profile:u1", 900);
        assert!(resp.message.contains("profile:u1"));
        assert!(resp.message.contains("user"));
    }

    #[test]
    fn test_namespace_stats_flattens_counters() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        let json = serde_json::to_value(NamespaceStats::new("event", 2, 300, stats)).unwrap();
        assert_eq!(json["hits"], 3);
        assert_eq!(json["size"], 2);
        assert!((json["hit_rate"].as_f64().unwrap() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let json = serde_json::to_string(&HealthResponse::healthy()).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_rate_limited_response() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at_ms: 1_700_000_060_000,
        };
        let json = serde_json::to_value(RateLimitedResponse::new("auth", &decision, 60)).unwrap();
        assert_eq!(json["policy"], "auth");
        assert_eq!(json["retry_after"], 60);
        assert_eq!(json["reset_at"], "2023-11-14T22:14:20Z");
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&ErrorResponse::new("Something went wrong")).unwrap();
        assert!(json.contains("Something went wrong"));
    }
}
