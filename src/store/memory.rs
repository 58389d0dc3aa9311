//! In-memory [`KvStore`] with Redis semantics.
//!
//! Stands in for Redis in tests and single-node development: native key
//! expiry driven by a [`Clock`], paged `SCAN`, integer `INCR`, and an outage
//! switch that makes every command fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{glob_match, ttl_millis, KvStore};
use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<u64>,
}

impl StoredValue {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Map-backed store following Redis command semantics.
#[derive(Debug)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl MemoryKvStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulates an outage: while set, every command fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of keys currently stored, including expired ones not yet purged.
    pub fn raw_len(&self) -> usize {
        self.entries.lock().len()
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable)
        } else {
            Ok(())
        }
    }

    /// Runs `f` over the map after dropping expired keys.
    fn with_live<T>(&self, f: impl FnOnce(&mut HashMap<String, StoredValue>, u64) -> T) -> T {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock();
        entries.retain(|_, stored| stored.is_live(now));
        f(&mut entries, now)
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.with_live(|entries, _| entries.get(key).map(|s| s.value.clone())))
    }

    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.ensure_available()?;
        self.with_live(|entries, now| {
            entries.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    expires_at: Some(now.saturating_add(ttl_millis(ttl).max(1))),
                },
            );
        });
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StoreResult<u64> {
        self.ensure_available()?;
        Ok(self.with_live(|entries, _| {
            keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64
        }))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.with_live(|entries, _| entries.contains_key(key)))
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> StoreResult<(u64, Vec<String>)> {
        self.ensure_available()?;
        let mut matching: Vec<String> = self.with_live(|entries, _| {
            entries
                .keys()
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect()
        });
        // Stable order so the cursor is a plain offset
        matching.sort_unstable();

        let start = (cursor as usize).min(matching.len());
        let end = (start + count.max(1)).min(matching.len());
        let next = if end >= matching.len() { 0 } else { end as u64 };
        Ok((next, matching[start..end].to_vec()))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.ensure_available()?;
        self.with_live(|entries, _| {
            let stored = entries.entry(key.to_string()).or_insert(StoredValue {
                value: "0".to_string(),
                expires_at: None,
            });
            let current: i64 = stored.value.parse().map_err(|_| {
                StoreError::Backend("ERR value is not an integer or out of range".to_string())
            })?;
            let next = current + 1;
            stored.value = next.to_string();
            Ok(next)
        })
    }

    async fn pexpire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.ensure_available()?;
        Ok(self.with_live(|entries, now| match entries.get_mut(key) {
            Some(stored) => {
                stored.expires_at = Some(now.saturating_add(ttl_millis(ttl).max(1)));
                true
            }
            None => false,
        }))
    }

    async fn pttl(&self, key: &str) -> StoreResult<i64> {
        self.ensure_available()?;
        Ok(self.with_live(|entries, now| match entries.get(key) {
            None => -2,
            Some(StoredValue {
                expires_at: None, ..
            }) => -1,
            Some(StoredValue {
                expires_at: Some(at),
                ..
            }) => (at - now) as i64,
        }))
    }
}
