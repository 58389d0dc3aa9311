//! Fixed-window rate limiter over the distributed store, with the local
//! window map as fallback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::policy::RateLimitPolicy;
use super::window::{LocalWindows, RateWindow};
use crate::cache::BackendKind;
use crate::clock::{system_clock, Clock};
use crate::config::Config;
use crate::error::StoreResult;
use crate::store::KvStore;
use crate::tasks::spawn_cleanup_task;

/// Key segment under which counters live, next to the cache namespaces.
///
/// No cache namespace may use this name.
pub const RATE_LIMIT_SEGMENT: &str = "ratelimit";

// == Decision ==
/// Outcome of a rate-limit check, with the metadata for response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Ceiling of the policy
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// Unix milliseconds at which the current window ends
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    fn from_window(policy: &RateLimitPolicy, window: RateWindow) -> Self {
        let limit = policy.max_requests();
        Self {
            allowed: window.count <= u64::from(limit),
            limit,
            remaining: u64::from(limit).saturating_sub(window.count) as u32,
            reset_at_ms: window.reset_at,
        }
    }

    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.reset_at_ms as i64).unwrap_or_default()
    }

    /// Time until the window ends.
    pub fn retry_after(&self, now_ms: u64) -> Duration {
        Duration::from_millis(self.reset_at_ms.saturating_sub(now_ms))
    }

    /// Whole seconds until the window ends, rounded up and at least one.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        let ms = self.retry_after(now_ms).as_millis() as u64;
        ms.div_ceil(1000).max(1)
    }
}

// == Rate Limiter ==
/// Counts requests per `(policy, identity)` and decides whether they pass.
///
/// With a distributed store every process shares one counter per key. On a
/// store failure the call is decided by this process's own window map, so
/// enforcement loosens during an outage instead of failing requests.
pub struct RateLimiter {
    remote: Option<Arc<dyn KvStore>>,
    local: Arc<LocalWindows>,
    key_prefix: String,
    clock: Arc<dyn Clock>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    // == Constructor ==
    pub fn new(
        remote: Option<Arc<dyn KvStore>>,
        key_prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            local: Arc::new(LocalWindows::new(clock.clone())),
            key_prefix: key_prefix.into(),
            clock,
            cleanup: Mutex::new(None),
        }
    }

    /// Builds the limiter over `store` and starts the window sweep.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config, store: Option<Arc<dyn KvStore>>) -> Self {
        let limiter = Self::new(store, config.key_prefix.clone(), system_clock());
        if limiter.remote.is_none() {
            info!("Rate limiter using in-process windows; limits are per instance");
        }
        limiter.start_cleanup(config.cleanup_interval());
        limiter
    }

    /// Spawns the periodic sweep of the local window map. The map also
    /// backs remote mode during store failures, so it runs in both modes.
    pub fn start_cleanup(&self, interval: Duration) {
        let mut slot = self.cleanup.lock();
        if slot.is_none() {
            *slot = Some(spawn_cleanup_task(self.local.clone(), interval));
        }
    }

    pub fn shutdown(&self) {
        if let Some(handle) = self.cleanup.lock().take() {
            handle.abort();
            info!("Rate-limit cleanup task stopped");
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        match self.remote {
            Some(_) => BackendKind::Remote,
            None => BackendKind::Local,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Local window map, used directly in local mode and as fallback.
    pub fn local_windows(&self) -> &LocalWindows {
        &self.local
    }

    /// Storage key for `identity` under `policy`.
    pub fn storage_key(&self, policy: &RateLimitPolicy, identity: &str) -> String {
        format!(
            "{}:{RATE_LIMIT_SEGMENT}:{}:{identity}",
            self.key_prefix,
            policy.name()
        )
    }

    // == Check ==
    /// Counts the request described by `headers` against `policy`.
    pub async fn check(&self, policy: &RateLimitPolicy, headers: &HeaderMap) -> RateLimitDecision {
        let identity = policy.identity(headers);
        self.check_identity(policy, &identity).await
    }

    /// Counts one request for an already derived identity.
    pub async fn check_identity(&self, policy: &RateLimitPolicy, identity: &str) -> RateLimitDecision {
        let key = self.storage_key(policy, identity);

        let window = match &self.remote {
            Some(store) => match self.remote_hit(store.as_ref(), &key, policy.window()).await {
                Ok(window) => window,
                Err(err) => {
                    warn!(
                        policy = policy.name(),
                        store = store.name(),
                        error = %err,
                        "Rate-limit store failed, deciding from local window"
                    );
                    self.local.hit(&key, policy.window())
                }
            },
            None => self.local.hit(&key, policy.window()),
        };

        let decision = RateLimitDecision::from_window(policy, window);
        if !decision.allowed {
            debug!(
                policy = policy.name(),
                identity,
                count = window.count,
                limit = decision.limit,
                "Rate limit exceeded"
            );
        }
        decision
    }

    /// One request against the shared counter. `INCR` is atomic across
    /// processes; the expiry is set only when the counter is created, so
    /// later hits (denied ones included) never extend the window.
    async fn remote_hit(
        &self,
        store: &dyn KvStore,
        key: &str,
        window: Duration,
    ) -> StoreResult<RateWindow> {
        let count = store.incr(key).await?;
        let now = self.clock.now_ms();
        let window_ms = window.as_millis() as u64;

        if count == 1 {
            store.pexpire(key, window).await?;
            return Ok(RateWindow {
                count: 1,
                reset_at: now + window_ms,
            });
        }

        let ttl = store.pttl(key).await?;
        let reset_at = if ttl >= 0 {
            now + ttl as u64
        } else {
            // Counter lost its expiry (a previous PEXPIRE failed)
            store.pexpire(key, window).await?;
            now + window_ms
        };

        Ok(RateWindow {
            count: count.max(0) as u64,
            reset_at,
        })
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.backend_kind())
            .field("key_prefix", &self.key_prefix)
            .field("local_windows", &self.local.len())
            .finish()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}
