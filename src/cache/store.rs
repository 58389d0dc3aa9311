//! Namespace Cache Module
//!
//! The per-namespace cache handle: typed get/set over whichever backend was
//! selected, with expiry, namespace isolation, and every store failure
//! downgraded to a miss or a no-op.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{Backend, CacheStats, Namespace, StatsCounters};
use crate::error::StoreResult;
use crate::store::{self, escape_glob};

// == Lookup ==
/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// A live value was found
    Hit(T),
    /// Nothing stored, or the entry expired
    Miss,
    /// The store failed or held an unreadable payload; treated as a miss
    Suppressed,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss | Lookup::Suppressed => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

// == Namespace Cache ==
/// Cache handle scoped to one namespace.
///
/// Cheap to clone; clones share the backend and the statistics.
#[derive(Debug, Clone)]
pub struct NamespaceCache {
    namespace: Namespace,
    /// `<global prefix>:<namespace>:`
    key_prefix: String,
    backend: Backend,
    disabled: bool,
    stats: Arc<StatsCounters>,
}

impl NamespaceCache {
    pub(crate) fn new(
        namespace: Namespace,
        global_prefix: &str,
        backend: Backend,
        disabled: bool,
        stats: Arc<StatsCounters>,
    ) -> Self {
        let key_prefix = format!("{global_prefix}:{}:", namespace.name());
        Self {
            namespace,
            key_prefix,
            backend,
            disabled,
            stats,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Fully qualified storage key for `key`.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    // == Get ==
    /// Returns the value stored under `key`, if present and not expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.into_option()
    }

    /// Reads `key`, reporting whether a miss came from a suppressed failure.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        if self.disabled {
            return Lookup::Miss;
        }

        let full_key = self.storage_key(key);
        let raw = match &self.backend {
            Backend::Local(local) => Ok(local.get(&full_key)),
            Backend::Remote(remote) => remote.get(&full_key).await,
        };

        match raw {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    self.stats.record_hit();
                    Lookup::Hit(value)
                }
                Err(err) => {
                    warn!(namespace = %self.namespace, key, error = %err, "Discarding unreadable cache payload");
                    self.stats.record_suppressed();
                    self.stats.record_miss();
                    Lookup::Suppressed
                }
            },
            Ok(None) => {
                self.stats.record_miss();
                Lookup::Miss
            }
            Err(err) => {
                warn!(namespace = %self.namespace, key, error = %err, "Cache read failed, treating as miss");
                self.stats.record_suppressed();
                self.stats.record_miss();
                Lookup::Suppressed
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`, or the namespace default.
    ///
    /// Failures are logged and swallowed. A zero TTL removes the key, since
    /// the value would already be expired.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if self.disabled {
            return;
        }

        let ttl = ttl.unwrap_or(self.namespace.default_ttl());
        if ttl.is_zero() {
            debug!(namespace = %self.namespace, key, "Zero TTL write, removing key instead");
            self.delete(key).await;
            return;
        }

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(namespace = %self.namespace, key, error = %err, "Value not serializable, skipping cache write");
                self.stats.record_suppressed();
                return;
            }
        };

        let full_key = self.storage_key(key);
        let result = match &self.backend {
            Backend::Local(local) => {
                local.set(full_key, payload, ttl);
                Ok(())
            }
            Backend::Remote(remote) => remote.set_px(&full_key, &payload, ttl).await,
        };

        match result {
            Ok(()) => self.stats.record_write(),
            Err(err) => {
                warn!(namespace = %self.namespace, key, error = %err, "Cache write failed");
                self.stats.record_suppressed();
            }
        }
    }

    // == Delete ==
    /// Removes `key`. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> bool {
        match self.try_delete(key).await {
            Ok(existed) => existed,
            Err(err) => {
                warn!(namespace = %self.namespace, key, error = %err, "Cache delete failed");
                self.stats.record_suppressed();
                false
            }
        }
    }

    /// Removes `key`, surfacing store failures.
    pub(crate) async fn try_delete(&self, key: &str) -> StoreResult<bool> {
        if self.disabled {
            return Ok(false);
        }
        let full_key = self.storage_key(key);
        let existed = match &self.backend {
            Backend::Local(local) => local.delete(&full_key),
            Backend::Remote(remote) => remote.del(&[full_key]).await? > 0,
        };
        if existed {
            self.stats.record_delete();
        }
        Ok(existed)
    }

    // == Clear ==
    /// Removes every key of this namespace. Returns the number removed.
    pub async fn clear(&self) -> usize {
        self.clear_prefix("").await
    }

    /// Removes every key of this namespace starting with `prefix`.
    pub async fn clear_prefix(&self, prefix: &str) -> usize {
        match self.try_clear_prefix(prefix).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(namespace = %self.namespace, prefix, error = %err, "Cache clear failed");
                self.stats.record_suppressed();
                0
            }
        }
    }

    /// Prefix clear, surfacing store failures.
    pub(crate) async fn try_clear_prefix(&self, prefix: &str) -> StoreResult<usize> {
        if self.disabled {
            return Ok(0);
        }
        let full_prefix = self.storage_key(prefix);
        let removed = match &self.backend {
            Backend::Local(local) => local.remove_prefix(&full_prefix),
            Backend::Remote(remote) => {
                let pattern = format!("{}*", escape_glob(&full_prefix));
                store::delete_matching(remote.as_ref(), &pattern).await?
            }
        };
        debug!(namespace = %self.namespace, prefix, removed, "Cleared cache keys");
        Ok(removed)
    }

    // == Has ==
    /// True iff a `get` for `key` would currently return a value.
    ///
    /// Remote payloads are read and parsed, so a key holding something other
    /// than JSON counts as absent, as it does for `get`.
    pub async fn has(&self, key: &str) -> bool {
        if self.disabled {
            return false;
        }
        let full_key = self.storage_key(key);
        match &self.backend {
            Backend::Local(local) => local.contains(&full_key),
            Backend::Remote(remote) => match remote.get(&full_key).await {
                Ok(payload) => payload
                    .is_some_and(|raw| serde_json::from_str::<IgnoredAny>(&raw).is_ok()),
                Err(err) => {
                    warn!(namespace = %self.namespace, key, error = %err, "Cache existence check failed");
                    self.stats.record_suppressed();
                    false
                }
            },
        }
    }

    // == Size ==
    /// Number of live entries in this namespace.
    pub async fn size(&self) -> usize {
        if self.disabled {
            return 0;
        }
        match &self.backend {
            Backend::Local(local) => local.count_prefix(&self.key_prefix),
            Backend::Remote(remote) => {
                let pattern = format!("{}*", escape_glob(&self.key_prefix));
                match store::scan_all(remote.as_ref(), &pattern).await {
                    Ok(keys) => keys.len(),
                    Err(err) => {
                        warn!(namespace = %self.namespace, error = %err, "Cache size scan failed");
                        self.stats.record_suppressed();
                        0
                    }
                }
            }
        }
    }

    // == Cleanup ==
    /// Evicts expired entries of this namespace. The distributed store
    /// expires keys itself, so this only does work in local mode.
    pub async fn cleanup(&self) -> usize {
        match &self.backend {
            Backend::Local(local) if !self.disabled => local.cleanup_prefix(&self.key_prefix),
            _ => 0,
        }
    }

    // == Read Through ==
    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// Errors from `compute` propagate and nothing is cached.
    pub async fn get_or_insert_with<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Lookup::Hit(value) = self.lookup(key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }
}
