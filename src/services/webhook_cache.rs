//! Webhook idempotency cache.
//!
//! DESIGN
//! ======
//! The payment provider delivers events at least once; retries of an already
//! handled event must be no-ops. The cache records event ids only *after*
//! the account mutation has committed — marking earlier would let a retry of
//! a half-failed delivery be swallowed silently.
//!
//! TRADE-OFFS
//! ==========
//! Retention must outlive the provider's retry horizon, which spans days;
//! the default is 72 hours and is configurable. Entries are in-process, so
//! in a multi-instance deployment a retry landing on another instance is
//! reprocessed — the account mutations are themselves idempotent updates,
//! which keeps that tolerable (recorded in DESIGN.md).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_RETENTION_HOURS: u64 = 72;

pub struct WebhookCache {
    seen: Mutex<HashMap<String, Instant>>,
    retention: Duration,
}

impl WebhookCache {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self { seen: Mutex::new(HashMap::new()), retention }
    }

    /// Retention from `WEBHOOK_RETENTION_HOURS`, default 72.
    #[must_use]
    pub fn from_env() -> Self {
        let hours = std::env::var("WEBHOOK_RETENTION_HOURS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETENTION_HOURS);
        Self::new(Duration::from_secs(hours * 3600))
    }

    /// Whether this event id has not been handled yet.
    #[must_use]
    pub fn should_process(&self, event_id: &str) -> bool {
        let seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        !seen.contains_key(event_id)
    }

    /// Record a handled event. Call only after the side effect has committed.
    pub fn mark_processed(&self, event_id: &str) {
        self.mark_processed_at(event_id, Instant::now());
    }

    fn mark_processed_at(&self, event_id: &str, now: Instant) {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        seen.insert(event_id.to_string(), now);
    }

    /// Evict entries past the retention window.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        seen.retain(|_, first_seen| now.duration_since(*first_seen) < self.retention);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
#[path = "webhook_cache_test.rs"]
mod tests;
