//! Namespace Module
//!
//! Logical groupings of cache keys, each with its own key prefix and default
//! time-to-live.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::rate_limit::RATE_LIMIT_SEGMENT;

/// A named group of cache keys sharing a prefix and a default TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    name: Cow<'static, str>,
    default_ttl: Duration,
}

impl Namespace {
    /// Event records and event list views
    pub const EVENT: Namespace = Namespace::fixed("event", 5 * 60);
    /// Member profiles and per-member views
    pub const USER: Namespace = Namespace::fixed("user", 15 * 60);
    /// Image metadata and signed URLs
    pub const IMAGE: Namespace = Namespace::fixed("image", 60 * 60);
    /// Video metadata
    pub const VIDEO: Namespace = Namespace::fixed("video", 60 * 60);
    /// Event documents
    pub const DOCUMENT: Namespace = Namespace::fixed("document", 30 * 60);
    /// Coordination records attached to events
    pub const COORDINATION: Namespace = Namespace::fixed("coordination", 5 * 60);
    /// Short-lived API responses
    pub const API: Namespace = Namespace::fixed("api", 60);

    /// Every built-in namespace.
    pub const BUILTIN: [Namespace; 7] = [
        Self::EVENT,
        Self::USER,
        Self::IMAGE,
        Self::VIDEO,
        Self::DOCUMENT,
        Self::COORDINATION,
        Self::API,
    ];

    const fn fixed(name: &'static str, ttl_secs: u64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default_ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Creates a custom namespace.
    ///
    /// The name must be non-empty and free of `:` and glob characters, since
    /// it becomes part of every key and of the `SCAN` pattern for `clear`.
    /// The rate limiter's key segment is reserved.
    pub fn new(name: impl Into<String>, default_ttl: Duration) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CacheError::InvalidNamespace(
                "namespace name cannot be empty".to_string(),
            ));
        }
        if name.contains([':', '*', '?', '[', ']', '\\']) {
            return Err(CacheError::InvalidNamespace(format!(
                "namespace '{name}' contains a reserved character"
            )));
        }
        if name == RATE_LIMIT_SEGMENT {
            return Err(CacheError::InvalidNamespace(format!(
                "namespace '{name}' is reserved for rate-limit counters"
            )));
        }
        if default_ttl.is_zero() {
            return Err(CacheError::InvalidNamespace(format!(
                "namespace '{name}' needs a non-zero default TTL"
            )));
        }
        Ok(Self {
            name: Cow::Owned(name),
            default_ttl,
        })
    }

    /// Looks up a built-in namespace by name.
    pub fn builtin(name: &str) -> Option<Namespace> {
        Self::BUILTIN.into_iter().find(|ns| ns.name() == name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
