//! Request DTOs for the cache ops API

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for `PUT /cache/:namespace/:key`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Any JSON value
    pub value: Value,
    /// TTL in seconds; the namespace default when absent
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_secs)
    }
}

/// Checks a key taken from a request path.
///
/// Returns an error message if the key is unusable, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {MAX_KEY_LENGTH} characters"
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"value": {"title": "Spring Gala"}}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value["title"], "Spring Gala");
        assert!(req.ttl().is_none());
    }

    #[test]
    fn test_set_request_with_ttl() {
        let json = r#"{"value": 5, "ttl": 60}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_set_request_requires_value() {
        assert!(serde_json::from_str::<SetRequest>(r#"{"ttl": 60}"#).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("").is_some());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_some());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_none());
        assert!(validate_key("detail:42").is_none());
    }
}
