//! Background sweep for in-process caches.
//!
//! Rate-limit windows and idempotency entries are pruned lazily on access;
//! keys that stop receiving traffic would otherwise linger forever. A single
//! periodic task garbage-collects both.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::state::AppState;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

fn sweep_interval_secs() -> u64 {
    std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
}

/// Spawn the background sweep task. Returns a handle for shutdown.
pub fn spawn_sweep_task(state: AppState) -> JoinHandle<()> {
    let interval_secs = sweep_interval_secs();
    info!(interval_secs, "cache sweep configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            state.rate_limiter.sweep().await;
            state.webhook_cache.sweep();
        }
    })
}
