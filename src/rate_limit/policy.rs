//! Rate-limit policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;

use super::identity::{client_address, KeyGenerator};
use crate::error::{CacheError, Result};

/// A `(window, ceiling, key generator)` triple under a unique name.
///
/// The name is part of every storage key, so two policies never share a
/// counter even for the same client.
#[derive(Clone)]
pub struct RateLimitPolicy {
    name: String,
    window: Duration,
    max_requests: u32,
    key_generator: Option<KeyGenerator>,
}

impl RateLimitPolicy {
    /// Creates a policy allowing `max_requests` per `window`.
    ///
    /// Rejects a zero window, a zero ceiling, and names containing `:` or
    /// glob characters.
    pub fn new(name: impl Into<String>, window: Duration, max_requests: u32) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains([':', '*', '?', '[', ']', '\\']) {
            return Err(CacheError::InvalidPolicy(format!(
                "policy name '{name}' is empty or contains a reserved character"
            )));
        }
        if window.as_millis() == 0 {
            return Err(CacheError::InvalidPolicy(format!(
                "policy '{name}' needs a window of at least one millisecond"
            )));
        }
        if max_requests == 0 {
            return Err(CacheError::InvalidPolicy(format!(
                "policy '{name}' needs a ceiling of at least one request"
            )));
        }
        Ok(Self {
            name,
            window,
            max_requests,
            key_generator: None,
        })
    }

    /// Replaces the default client-address identity.
    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&HeaderMap) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }

    /// Same as [`with_key_generator`](Self::with_key_generator) for a
    /// shared generator.
    pub fn with_shared_key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = Some(generator);
        self
    }

    // == Presets ==

    /// Sign-in and password attempts: 5 per 15 minutes.
    pub fn auth() -> Self {
        Self::preset("auth", Duration::from_secs(15 * 60), 5)
    }

    /// General API calls: 60 per minute.
    pub fn api() -> Self {
        Self::preset("api", Duration::from_secs(60), 60)
    }

    /// Image, video and document uploads: 20 per hour.
    pub fn upload() -> Self {
        Self::preset("upload", Duration::from_secs(60 * 60), 20)
    }

    /// Contact-form submissions: 3 per hour.
    pub fn contact() -> Self {
        Self::preset("contact", Duration::from_secs(60 * 60), 3)
    }

    fn preset(name: &'static str, window: Duration, max_requests: u32) -> Self {
        Self {
            name: name.to_string(),
            window,
            max_requests,
            key_generator: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Identity of the request under this policy.
    pub fn identity(&self, headers: &HeaderMap) -> String {
        match &self.key_generator {
            Some(generator) => generator(headers),
            None => client_address(headers),
        }
    }
}

impl fmt::Debug for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitPolicy")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .field("custom_key", &self.key_generator.is_some())
            .finish()
    }
}
