//! Fixed-window counters kept in process memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::tasks::Sweep;

/// Requests seen for one key in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests counted so far, denied ones included
    pub count: u64,
    /// Unix milliseconds at which the window ends
    pub reset_at: u64,
}

impl RateWindow {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.reset_at
    }
}

/// Per-key windows private to this process.
///
/// Counts are not shared between instances, so a horizontally scaled
/// deployment relying on this map admits up to `instances * max_requests`
/// per window.
#[derive(Debug)]
pub struct LocalWindows {
    windows: Mutex<HashMap<String, RateWindow>>,
    clock: Arc<dyn Clock>,
}

impl LocalWindows {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Counts one request for `key` and returns the updated window.
    ///
    /// An unseen or expired key starts a new window of length `window`.
    /// Later requests never move `reset_at`.
    pub fn hit(&self, key: &str, window: Duration) -> RateWindow {
        let now = self.clock.now_ms();
        let fresh = RateWindow {
            count: 0,
            reset_at: now + window.as_millis() as u64,
        };

        let mut windows = self.windows.lock();
        let current = windows.entry(key.to_string()).or_insert(fresh);
        if current.is_expired(now) {
            *current = fresh;
        }
        current.count += 1;
        *current
    }

    /// Current window for `key`, if one is open.
    pub fn peek(&self, key: &str) -> Option<RateWindow> {
        let now = self.clock.now_ms();
        self.windows
            .lock()
            .get(key)
            .copied()
            .filter(|window| !window.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| !window.is_expired(now));
        before - windows.len()
    }
}

impl Sweep for LocalWindows {
    fn label(&self) -> &'static str {
        "rate_limit"
    }

    fn sweep_expired(&self) -> usize {
        self.cleanup_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn windows() -> (LocalWindows, ManualClock) {
        let clock = ManualClock::default();
        (LocalWindows::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_hits_share_reset_time() {
        let (windows, clock) = windows();
        let first = windows.hit("k", MINUTE);
        clock.advance(Duration::from_secs(30));
        let second = windows.hit("k", MINUTE);

        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert_eq!(first.reset_at, second.reset_at);
    }

    #[test]
    fn test_expired_window_restarts() {
        let (windows, clock) = windows();
        windows.hit("k", MINUTE);
        windows.hit("k", MINUTE);
        clock.advance(MINUTE);

        let restarted = windows.hit("k", MINUTE);
        assert_eq!(restarted.count, 1);
        assert_eq!(restarted.reset_at, clock.now_ms() + 60_000);
    }

    #[test]
    fn test_peek_and_cleanup() {
        let (windows, clock) = windows();
        windows.hit("a", MINUTE);
        windows.hit("b", Duration::from_secs(1));
        clock.advance(Duration::from_secs(1));

        assert!(windows.peek("a").is_some());
        assert!(windows.peek("b").is_none());
        assert_eq!(windows.sweep_expired(), 1);
        assert_eq!(windows.len(), 1);
    }
}
