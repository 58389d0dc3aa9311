//! Cache Manager Module
//!
//! Owns the backend choice, the disable switch, the per-namespace statistics
//! and the local sweep task. Hands out [`NamespaceCache`] handles.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::{Backend, BackendKind, LocalStore, Namespace, NamespaceCache, StatsCounters};
use crate::clock::{system_clock, Clock};
use crate::config::Config;
use crate::store::KvStore;
use crate::tasks::spawn_cleanup_task;

/// Construction options for a [`CacheManager`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Global key prefix
    pub key_prefix: String,
    /// Turns every operation into a no-op
    pub disabled: bool,
    /// Time source for the local map
    pub clock: Arc<dyn Clock>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            key_prefix: "club".to_string(),
            disabled: false,
            clock: system_clock(),
        }
    }
}

impl CacheOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            key_prefix: config.key_prefix.clone(),
            disabled: config.cache_disabled,
            ..Self::default()
        }
    }
}

/// Entry point to the cache: one per process, injected where needed.
#[derive(Debug)]
pub struct CacheManager {
    backend: Backend,
    disabled: bool,
    key_prefix: String,
    registry: Mutex<BTreeMap<String, (Namespace, Arc<StatsCounters>)>>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a manager over an already selected backend. Registers the
    /// built-in namespaces. Does not start the sweep task.
    pub fn new(backend: Backend, options: CacheOptions) -> Self {
        let manager = Self {
            backend,
            disabled: options.disabled,
            key_prefix: options.key_prefix,
            registry: Mutex::new(BTreeMap::new()),
            cleanup: Mutex::new(None),
        };
        for ns in Namespace::BUILTIN {
            manager.register(&ns);
        }
        manager
    }

    /// Selects the backend from `store` and starts the local sweep when the
    /// local map is in use.
    ///
    /// Must be called inside a tokio runtime.
    pub fn from_config(config: &Config, store: Option<Arc<dyn KvStore>>) -> Self {
        let options = CacheOptions::from_config(config);
        let backend = Backend::select(store, options.clock.clone());
        let manager = Self::new(backend, options);

        info!(
            backend = ?manager.backend_kind(),
            disabled = manager.disabled,
            prefix = %manager.key_prefix,
            "Cache initialized"
        );
        manager.start_cleanup(config.cleanup_interval());
        manager
    }

    /// Spawns the periodic sweep of the local map.
    ///
    /// Does nothing in remote or disabled mode, or if already running.
    pub fn start_cleanup(&self, interval: Duration) {
        let Some(local) = self.local_store() else {
            return;
        };
        if self.disabled {
            return;
        }
        let mut slot = self.cleanup.lock();
        if slot.is_none() {
            *slot = Some(spawn_cleanup_task(local, interval));
        }
    }

    /// Stops the sweep task. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = self.cleanup.lock().take() {
            handle.abort();
            info!("Cache cleanup task stopped");
        }
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Handle for `namespace`, registering it on first use.
    pub fn namespace(&self, namespace: &Namespace) -> NamespaceCache {
        let stats = self.register(namespace);
        NamespaceCache::new(
            namespace.clone(),
            &self.key_prefix,
            self.backend.clone(),
            self.disabled,
            stats,
        )
    }

    /// Handles for every registered namespace, ordered by name.
    pub fn namespaces(&self) -> Vec<NamespaceCache> {
        let registered: Vec<Namespace> = self
            .registry
            .lock()
            .values()
            .map(|(ns, _)| ns.clone())
            .collect();
        registered.iter().map(|ns| self.namespace(ns)).collect()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// The local map, when the local backend is selected.
    pub fn local_store(&self) -> Option<Arc<LocalStore>> {
        match &self.backend {
            Backend::Local(local) => Some(local.clone()),
            Backend::Remote(_) => None,
        }
    }

    /// Sweeps expired entries of every namespace now. Returns the number
    /// removed.
    pub fn cleanup(&self) -> usize {
        match self.local_store() {
            Some(local) if !self.disabled => local.cleanup_expired(),
            _ => 0,
        }
    }

    fn register(&self, namespace: &Namespace) -> Arc<StatsCounters> {
        let mut registry = self.registry.lock();
        let (_, stats) = registry
            .entry(namespace.name().to_string())
            .or_insert_with(|| (namespace.clone(), Arc::default()));
        stats.clone()
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryKvStore;

    fn local_manager(clock: &ManualClock) -> CacheManager {
        let options = CacheOptions {
            key_prefix: "test".to_string(),
            disabled: false,
            clock: Arc::new(clock.clone()),
        };
        CacheManager::new(Backend::select(None, options.clock.clone()), options)
    }

    #[test]
    fn test_builtins_registered() {
        let manager = local_manager(&ManualClock::default());
        let names: Vec<String> = manager
            .namespaces()
            .iter()
            .map(|c| c.namespace().name().to_string())
            .collect();
        assert_eq!(names.len(), Namespace::BUILTIN.len());
        assert!(names.contains(&"event".to_string()));
    }

    #[tokio::test]
    async fn test_handles_share_stats() {
        let manager = local_manager(&ManualClock::default());
        let a = manager.namespace(&Namespace::EVENT);
        let b = manager.namespace(&Namespace::EVENT);

        a.set("k", &1, None).await;
        let _ = b.get::<i32>("k").await;
        assert_eq!(a.stats().hits, 1);
        assert_eq!(a.stats().writes, 1);
    }

    #[tokio::test]
    async fn test_handles_share_entries_across_namespaces_map() {
        let manager = local_manager(&ManualClock::default());
        manager.namespace(&Namespace::EVENT).set("k", &1, None).await;
        manager.namespace(&Namespace::USER).set("k", &2, None).await;

        let local = manager.local_store().unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(
            manager.namespace(&Namespace::USER).get::<i32>("k").await,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_from_config_local_starts_cleanup() {
        let manager = CacheManager::from_config(&Config::default(), None);
        assert_eq!(manager.backend_kind(), BackendKind::Local);
        assert!(manager.is_cleanup_running());

        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!manager.is_cleanup_running());
    }

    #[tokio::test]
    async fn test_from_config_remote_has_no_cleanup() {
        let store: Arc<dyn KvStore> =
            Arc::new(MemoryKvStore::new(Arc::new(ManualClock::default())));
        let manager = CacheManager::from_config(&Config::default(), Some(store));
        assert_eq!(manager.backend_kind(), BackendKind::Remote);
        assert!(manager.local_store().is_none());
        assert!(!manager.is_cleanup_running());
    }

    #[tokio::test]
    async fn test_disabled_manager_skips_cleanup() {
        let config = Config {
            cache_disabled: true,
            ..Config::default()
        };
        let manager = CacheManager::from_config(&config, None);
        assert!(manager.is_disabled());
        assert!(!manager.is_cleanup_running());
    }

    #[tokio::test]
    async fn test_manual_cleanup() {
        let clock = ManualClock::default();
        let manager = local_manager(&clock);
        manager
            .namespace(&Namespace::EVENT)
            .set("k", &1, Some(Duration::from_secs(1)))
            .await;
        clock.advance(Duration::from_secs(2));
        assert_eq!(manager.cleanup(), 1);
    }
}
