//! Configuration Module
//!
//! Handles loading the cache, store and server configuration from
//! environment variables.

use std::env;
use std::time::Duration;

/// Runtime configuration.
///
/// The presence of a Redis URL selects the distributed backend; its absence
/// selects the in-process map. `cache_disabled` is an independent switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Redis connection URL, if a distributed store is configured
    pub redis_url: Option<String>,
    /// Access token for the store, applied as the connection password
    pub redis_token: Option<String>,
    /// Turns every cache operation into a no-op
    pub cache_disabled: bool,
    /// Global key prefix shared by every process using the same store
    pub key_prefix: String,
    /// Timeout in milliseconds for a single store call
    pub store_timeout_ms: u64,
    /// Local sweep interval in seconds
    pub cleanup_interval: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_REDIS_URL` (or `REDIS_URL`) - Redis URL (default: unset)
    /// - `CACHE_REDIS_TOKEN` - Store access token (default: unset)
    /// - `CACHE_DISABLED` - Disable caching entirely (default: false)
    /// - `CACHE_KEY_PREFIX` - Global key prefix (default: "club")
    /// - `CACHE_STORE_TIMEOUT_MS` - Store call timeout (default: 500)
    /// - `CLEANUP_INTERVAL` - Local sweep frequency in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            redis_url: var("CACHE_REDIS_URL").or_else(|| var("REDIS_URL")),
            redis_token: var("CACHE_REDIS_TOKEN"),
            cache_disabled: var("CACHE_DISABLED")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.cache_disabled),
            key_prefix: var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            store_timeout_ms: var("CACHE_STORE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.store_timeout_ms),
            cleanup_interval: var("CLEANUP_INTERVAL")
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(defaults.cleanup_interval),
            server_port: var("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }

    /// Whether a distributed store is configured.
    pub fn has_remote_store(&self) -> bool {
        self.redis_url.is_some()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_token: None,
            cache_disabled: false,
            key_prefix: "club".to_string(),
            store_timeout_ms: 500,
            cleanup_interval: 300,
            server_port: 3000,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
