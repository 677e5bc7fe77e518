//! Rate-limit backing stores.
//!
//! DESIGN
//! ======
//! One trait, two implementations. `MemoryStore` keeps sliding windows in a
//! `HashMap<String, VecDeque<Instant>>` and is correct within a single
//! process only. `RedisStore` (in `redis.rs`) shares windows across
//! instances. The strategy is chosen once at startup; callers only ever see
//! `dyn RateLimitStore`.
//!
//! A check never fails structurally — `allowed = false` is the throttling
//! signal, not an error.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds at which the caller may expect capacity again.
    pub reset_at: i64,
}

/// Pluggable sliding-window store. Implementations must be safe to share
/// across request handlers.
#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Prune entries older than `window`, then either record the request
    /// (allowed) or report exhaustion without recording.
    async fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitDecision;

    /// Drop state that no longer affects any window. Called periodically.
    async fn sweep(&self);
}

/// Current time as whole seconds since the Unix epoch.
pub(crate) fn unix_now() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_secs()).unwrap_or(0)
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Per-process sliding windows. Keys are created on first request and
/// garbage-collected by [`MemoryStore::sweep`] once their window empties.
pub struct MemoryStore {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    /// Largest window any check has used; sweep must not prune entries that
    /// could still fall inside a live window.
    max_window: Mutex<Duration>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()), max_window: Mutex::new(Duration::ZERO) }
    }

    /// Check + record with an explicit timestamp (for testing).
    fn check_at(&self, key: &str, max_requests: u32, window: Duration, now: Instant) -> RateLimitDecision {
        {
            let mut max_window = self
                .max_window
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if window > *max_window {
                *max_window = window;
            }
        }

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let deque = windows.entry(key.to_string()).or_default();
        prune_window(deque, now, window);

        let count = u32::try_from(deque.len()).unwrap_or(u32::MAX);
        if count >= max_requests {
            // Capacity returns when the oldest recorded request ages out.
            let until_reset = deque
                .front()
                .map(|&front| window.saturating_sub(now.duration_since(front)))
                .unwrap_or(window);
            return RateLimitDecision {
                allowed: false,
                limit: max_requests,
                remaining: 0,
                reset_at: unix_now() + as_secs_i64(until_reset),
            };
        }

        deque.push_back(now);
        RateLimitDecision {
            allowed: true,
            limit: max_requests,
            remaining: max_requests - count - 1,
            reset_at: unix_now() + as_secs_i64(window),
        }
    }

    fn sweep_at(&self, now: Instant) {
        let horizon = *self
            .max_window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        windows.retain(|_, deque| {
            prune_window(deque, now, horizon);
            !deque.is_empty()
        });
    }

    #[cfg(test)]
    fn key_count(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RateLimitStore for MemoryStore {
    async fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitDecision {
        self.check_at(key, max_requests, window, Instant::now())
    }

    async fn sweep(&self) {
        self.sweep_at(Instant::now());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

fn as_secs_i64(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
