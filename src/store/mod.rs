//! Distributed Store Module
//!
//! The primitive operations the cache and the rate limiter need from a
//! shared key-value store. Each method is a single atomic store command;
//! nothing in this crate composes them into transactions.

mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::error::{CacheError, StoreResult};

pub use self::memory::MemoryKvStore;
pub use self::redis::RedisStore;

/// Page size requested from `SCAN`.
pub const SCAN_PAGE_SIZE: usize = 200;

/// Maximum number of keys sent in one `DEL`.
pub const DELETE_BATCH_SIZE: usize = 500;

/// Largest expiry Redis accepts for `PX` and `PEXPIRE`, in milliseconds.
pub const MAX_TTL_MS: u64 = i64::MAX as u64;

/// Whole milliseconds of `ttl`, saturating at [`MAX_TTL_MS`].
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .min(MAX_TTL_MS)
}

// == KvStore Trait ==
/// Primitive commands of a distributed key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `GET key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// `SET key value PX ttl`
    async fn set_px(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// `DEL key [key ...]`, returning how many keys existed.
    async fn del(&self, keys: &[String]) -> StoreResult<u64>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// `SCAN cursor MATCH pattern COUNT count`
    ///
    /// A returned cursor of `0` means the iteration is complete.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize)
        -> StoreResult<(u64, Vec<String>)>;

    /// `INCR key`
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// `PEXPIRE key ttl`
    async fn pexpire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// `PTTL key`: remaining milliseconds, `-1` without expiry, `-2` if absent.
    async fn pttl(&self, key: &str) -> StoreResult<i64>;
}

// == Factory ==
/// Opens the distributed store described by `config`, if any.
///
/// No connection is made here; the first command connects lazily.
pub fn connect(config: &Config) -> crate::error::Result<Option<Arc<dyn KvStore>>> {
    let Some(url) = config.redis_url.as_deref() else {
        info!("No distributed store configured, using in-process maps");
        return Ok(None);
    };

    let store = RedisStore::open(url, config.redis_token.as_deref(), config.store_timeout())
        .map_err(|e| CacheError::Config(format!("invalid Redis URL: {e}")))?;
    info!(timeout_ms = config.store_timeout_ms, "Distributed store configured");
    Ok(Some(Arc::new(store)))
}

// == Scan Helpers ==
/// Collects every key matching `pattern`, following the cursor until the
/// store reports the iteration complete.
pub async fn scan_all(store: &dyn KvStore, pattern: &str) -> StoreResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor = 0;
    loop {
        let (next, page) = store.scan(cursor, pattern, SCAN_PAGE_SIZE).await?;
        keys.extend(page);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    // SCAN may return a key more than once
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}

/// Deletes every key matching `pattern`. Returns the number removed.
pub async fn delete_matching(store: &dyn KvStore, pattern: &str) -> StoreResult<usize> {
    let keys = scan_all(store, pattern).await?;
    let mut removed = 0;
    for batch in keys.chunks(DELETE_BATCH_SIZE) {
        removed += store.del(batch).await? as usize;
    }
    Ok(removed)
}

// == Glob Helpers ==
/// Escapes the characters `SCAN MATCH` treats as wildcards.
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Matches `key` against a glob pattern with `*`, `?` and `\` escapes.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    glob_match_at(&pattern, &key)
}

fn glob_match_at(pattern: &[char], key: &[char]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some('*') => (0..=key.len()).any(|skip| glob_match_at(&pattern[1..], &key[skip..])),
        Some('?') => !key.is_empty() && glob_match_at(&pattern[1..], &key[1..]),
        Some('\\') if pattern.len() > 1 => {
            key.first() == Some(&pattern[1]) && glob_match_at(&pattern[2..], &key[1..])
        }
        Some(ch) => key.first() == Some(ch) && glob_match_at(&pattern[1..], &key[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_ttl_millis_saturates() {
        assert_eq!(ttl_millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(ttl_millis(Duration::from_secs(18_446_744_073_709_552)), MAX_TTL_MS);
        assert_eq!(ttl_millis(Duration::MAX), MAX_TTL_MS);
    }

    #[test]
    fn test_glob_prefix_match() {
        assert!(glob_match("club:event:*", "club:event:detail:1"));
        assert!(!glob_match("club:event:*", "club:user:detail:1"));
    }

    #[test]
    fn test_glob_question_mark() {
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
    }

    #[test]
    fn test_escaped_wildcards_are_literal() {
        let pattern = format!("{}*", escape_glob("odd*key:"));
        assert_eq!(pattern, "odd\\*key:*");
        assert!(glob_match(&pattern, "odd*key:1"));
        assert!(!glob_match(&pattern, "oddXkey:1"));
    }

    #[test]
    fn test_connect_without_url_is_local() {
        let store = connect(&Config::default()).unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let config = Config {
            redis_url: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(matches!(connect(&config), Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_scan_all_pages_through_cursor() {
        let store = MemoryKvStore::new(Arc::new(ManualClock::default()));
        for i in 0..(SCAN_PAGE_SIZE * 2 + 7) {
            store
                .set_px(&format!("p:{i}"), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        store.set_px("other", "v", Duration::from_secs(60)).await.unwrap();

        let keys = scan_all(&store, "p:*").await.unwrap();
        assert_eq!(keys.len(), SCAN_PAGE_SIZE * 2 + 7);
    }

    #[tokio::test]
    async fn test_delete_matching_leaves_other_keys() {
        let store = MemoryKvStore::new(Arc::new(ManualClock::default()));
        store.set_px("a:1", "v", Duration::from_secs(60)).await.unwrap();
        store.set_px("a:2", "v", Duration::from_secs(60)).await.unwrap();
        store.set_px("b:1", "v", Duration::from_secs(60)).await.unwrap();

        assert_eq!(delete_matching(&store, "a:*").await.unwrap(), 2);
        assert!(store.exists("b:1").await.unwrap());
    }
}
