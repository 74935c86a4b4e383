//! Rate Limiting Infrastructure
//!
//! Fixed-window counters keyed by an arbitrary string, plus an in-memory
//! expiring store. Counters are ephemeral: losing them on restart only
//! resets the current windows.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::Clock;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at_ms: i64,
}

/// Rate limit storage failure
#[derive(Debug, thiserror::Error)]
#[error("rate limit store unavailable: {0}")]
pub struct RateLimitError(pub String);

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Count one request against `key` and report whether it is within the limit.
    ///
    /// The first request of a window opens it; once `max_requests` have been
    /// counted every further request in the same window is refused.
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Drop windows that have already closed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    reset_at_ms: i64,
    count: u32,
}

/// How often `check_and_increment` sweeps closed windows
pub const SWEEP_INTERVAL_MS: i64 = 60_000;

/// In-memory fixed-window store
///
/// Closed windows are swept inline at most once per [`SWEEP_INTERVAL_MS`],
/// so the map only holds keys seen within the longest window plus one
/// sweep interval, whatever the housekeeping schedule.
pub struct FixedWindowStore {
    windows: DashMap<String, Window>,
    clock: Arc<dyn Clock>,
    next_sweep_ms: AtomicI64,
}

impl FixedWindowStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let next_sweep_ms = AtomicI64::new(clock.now_ms() + SWEEP_INTERVAL_MS);
        Self {
            windows: DashMap::new(),
            clock,
            next_sweep_ms,
        }
    }

    /// Number of tracked keys, open or not yet purged
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn hit(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = self.clock.now_ms();
        let window_ms = config.window_ms();

        // Must run before the entry guard below is taken
        self.sweep_if_due(now);

        let mut window = self.windows.entry(key.to_string()).or_insert(Window {
            reset_at_ms: now + window_ms,
            count: 0,
        });

        if now >= window.reset_at_ms {
            window.reset_at_ms = now + window_ms;
            window.count = 0;
        }

        window.count = window.count.saturating_add(1);

        RateLimitResult {
            allowed: window.count <= config.max_requests,
            remaining: config.max_requests.saturating_sub(window.count),
            reset_at_ms: window.reset_at_ms,
        }
    }

    fn sweep_if_due(&self, now: i64) {
        let due = self.next_sweep_ms.load(Ordering::Acquire);
        if now < due {
            return;
        }
        // One caller wins the slot; the others carry on without sweeping
        if self
            .next_sweep_ms
            .compare_exchange(due, now + SWEEP_INTERVAL_MS, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.purge_at(now);
        }
    }

    fn purge_at(&self, now: i64) -> u64 {
        let before = self.windows.len();
        self.windows.retain(|_, window| window.reset_at_ms > now);
        before.saturating_sub(self.windows.len()) as u64
    }
}

impl RateLimitStore for FixedWindowStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        Ok(self.hit(key, config))
    }

    async fn purge_expired(&self) -> Result<u64, RateLimitError> {
        Ok(self.purge_at(self.clock.now_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Arc, FixedWindowStore, RateLimitConfig, RateLimitStore, SWEEP_INTERVAL_MS};
    use crate::clock::ManualClock;
    use chrono::Duration as ChronoDuration;

    fn store() -> (Arc<ManualClock>, FixedWindowStore) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = FixedWindowStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_ceiling_within_window() {
        let (_clock, store) = store();
        let config = RateLimitConfig::new(5, 300);

        for i in 0..5 {
            let result = store.check_and_increment("redeem:1.2.3.4", &config).await.unwrap();
            assert!(result.allowed, "attempt {} should pass", i + 1);
            assert_eq!(result.remaining, 4 - i);
        }

        let sixth = store.check_and_increment("redeem:1.2.3.4", &config).await.unwrap();
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let (clock, store) = store();
        let config = RateLimitConfig::new(2, 300);

        store.check_and_increment("k", &config).await.unwrap();
        store.check_and_increment("k", &config).await.unwrap();
        assert!(!store.check_and_increment("k", &config).await.unwrap().allowed);

        clock.advance(ChronoDuration::seconds(299));
        assert!(!store.check_and_increment("k", &config).await.unwrap().allowed);

        clock.advance(ChronoDuration::seconds(1));
        let reopened = store.check_and_increment("k", &config).await.unwrap();
        assert!(reopened.allowed);
        assert_eq!(reopened.remaining, 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_clock, store) = store();
        let config = RateLimitConfig::new(1, 60);

        assert!(store.check_and_increment("redeem:a", &config).await.unwrap().allowed);
        assert!(!store.check_and_increment("redeem:a", &config).await.unwrap().allowed);
        assert!(store.check_and_increment("redeem:b", &config).await.unwrap().allowed);
        assert!(store.check_and_increment("playback:a", &config).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_purge_drops_closed_windows_only() {
        let (clock, store) = store();
        store
            .check_and_increment("short", &RateLimitConfig::new(5, 60))
            .await
            .unwrap();
        store
            .check_and_increment("long", &RateLimitConfig::new(5, 600))
            .await
            .unwrap();

        clock.advance(ChronoDuration::seconds(61));
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_windows_swept_inline() {
        let (clock, store) = store();
        let config = RateLimitConfig::new(5, 300);

        for i in 0..10_000 {
            let key = format!("redeem:2001:db8::{:x}", i);
            store.check_and_increment(&key, &config).await.unwrap();
        }
        assert_eq!(store.len(), 10_000);

        clock.advance(ChronoDuration::hours(23));
        store
            .check_and_increment("redeem:2001:db8::ffff:1", &config)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_inline_sweep_waits_for_interval() {
        let (clock, store) = store();
        let config = RateLimitConfig::new(5, 1);

        store.check_and_increment("a", &config).await.unwrap();
        clock.advance(ChronoDuration::milliseconds(SWEEP_INTERVAL_MS / 2));
        store.check_and_increment("b", &config).await.unwrap();

        // "a" is closed but the sweep is not due yet
        assert_eq!(store.len(), 2);

        clock.advance(ChronoDuration::milliseconds(SWEEP_INTERVAL_MS));
        store.check_and_increment("c", &config).await.unwrap();
        assert_eq!(store.len(), 1);
    }
}
