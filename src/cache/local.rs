//! Local Store Module
//!
//! Process-private map used when no distributed store is configured.
//! Keys are fully qualified (`<prefix>:<namespace>:<key>`), so one map serves
//! every namespace and namespace operations work on key prefixes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::cache::CacheEntry;
use crate::clock::Clock;
use crate::tasks::Sweep;

/// In-process key-value map with lazy and swept expiry.
#[derive(Debug)]
pub struct LocalStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Returns the payload if present, evicting it if expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_ms();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }
        self.evict_if_expired(key, now);
        None
    }

    pub fn set(&self, key: String, value: String, ttl: Duration) {
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
        self.entries.write().insert(key, entry);
    }

    /// Removes a key. Returns whether a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = self.clock.now_ms();
        self.entries
            .write()
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes every key starting with `prefix`. Returns the number of live
    /// entries removed.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        self.entries.write().retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if !entry.is_expired(now) {
                removed += 1;
            }
            false
        });
        removed
    }

    /// Counts live entries whose key starts with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        let now = self.clock.now_ms();
        self.entries
            .read()
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .count()
    }

    /// Removes expired entries under `prefix`. Returns the number removed.
    pub fn cleanup_prefix(&self, prefix: &str) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, entry| !(key.starts_with(prefix) && entry.is_expired(now)));
        before - entries.len()
    }

    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_prefix("")
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn evict_if_expired(&self, key: &str, now: u64) {
        let mut entries = self.entries.write();
        // Re-check under the write lock: a concurrent set may have replaced it
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
    }
}

impl Sweep for LocalStore {
    fn label(&self) -> &'static str {
        "cache"
    }

    fn sweep_expired(&self) -> usize {
        self.cleanup_expired()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn local() -> (LocalStore, ManualClock) {
        let clock = ManualClock::default();
        (LocalStore::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_set_and_get() {
        let (store, _) = local();
        store.set("a:1".to_string(), "1".to_string(), Duration::from_secs(5));
        assert_eq!(store.get("a:1").as_deref(), Some("1"));
        assert_eq!(store.get("a:2"), None);
    }

    #[test]
    fn test_get_evicts_expired() {
        let (store, clock) = local();
        store.set("a:1".to_string(), "1".to_string(), Duration::from_secs(5));
        clock.advance(Duration::from_secs(5));

        assert_eq!(store.get("a:1"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_expired_reports_absent() {
        let (store, clock) = local();
        store.set("a:1".to_string(), "1".to_string(), Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert!(!store.delete("a:1"));
    }

    #[test]
    fn test_prefix_operations() {
        let (store, clock) = local();
        store.set("a:1".to_string(), "1".to_string(), Duration::from_secs(1));
        store.set("a:2".to_string(), "2".to_string(), Duration::from_secs(60));
        store.set("b:1".to_string(), "3".to_string(), Duration::from_secs(60));

        assert_eq!(store.count_prefix("a:"), 2);
        clock.advance(Duration::from_secs(1));
        assert_eq!(store.count_prefix("a:"), 1);

        assert_eq!(store.remove_prefix("a:"), 1);
        assert_eq!(store.len(), 1);
        assert!(store.contains("b:1"));
    }

    #[test]
    fn test_cleanup_expired() {
        let (store, clock) = local();
        store.set("a:1".to_string(), "1".to_string(), Duration::from_secs(1));
        store.set("b:1".to_string(), "2".to_string(), Duration::from_secs(1));
        store.set("b:2".to_string(), "3".to_string(), Duration::from_secs(10));
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.cleanup_prefix("a:"), 1);
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
