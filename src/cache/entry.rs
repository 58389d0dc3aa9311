//! Cache Entry Module
//!
//! Defines the structure for entries held in the local map.

use std::time::Duration;

use crate::store::ttl_millis;

// == Cache Entry ==
/// A serialized value with its creation and expiry timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The JSON payload
    pub value: String,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after `now_ms`.
    pub fn new(value: String, now_ms: u64, ttl: Duration) -> Self {
        Self {
            value,
            created_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_millis(ttl)),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration
    /// time, so a TTL that has fully elapsed is never served.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at.saturating_sub(now_ms)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MAX_TTL_MS;

    const NOW: u64 = 1_700_000_000_000;

    #[test]
    fn test_entry_creation() {
        let entry = CacheEntry::new("\"v\"".to_string(), NOW, Duration::from_secs(60));

        assert_eq!(entry.created_at, NOW);
        assert_eq!(entry.expires_at, NOW + 60_000);
        assert!(!entry.is_expired(NOW));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new("1".to_string(), NOW, Duration::from_secs(1));

        assert!(!entry.is_expired(NOW + 999));
        assert!(entry.is_expired(NOW + 1_000));
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("1".to_string(), NOW, Duration::from_secs(10));

        assert_eq!(entry.ttl_remaining_ms(NOW + 4_000), 6_000);
        assert_eq!(entry.ttl_remaining_ms(NOW + 20_000), 0);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        // Zero TTL expires at creation time
        let entry = CacheEntry::new("1".to_string(), NOW, Duration::ZERO);
        assert!(entry.is_expired(NOW), "Entry should be expired at boundary");
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("1".to_string(), NOW, Duration::from_secs(18_446_744_073_709_552));
        assert_eq!(entry.expires_at, NOW + MAX_TTL_MS);
        assert!(!entry.is_expired(NOW + 1_000));

        let entry = CacheEntry::new("1".to_string(), u64::MAX - 5, Duration::MAX);
        assert_eq!(entry.expires_at, u64::MAX);
    }
}
