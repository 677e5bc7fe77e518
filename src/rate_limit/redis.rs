//! Redis-backed sliding-window store for multi-instance deployments.
//!
//! DESIGN
//! ======
//! The check runs as a single Lua script so prune + count + append are atomic
//! on the server: concurrent instances cannot both consume the last slot.
//! Windows live in a sorted set scored by milliseconds; a PEXPIRE bounds
//! stale keys, so `sweep` has nothing to do here.
//!
//! TRADE-OFFS
//! ==========
//! A Redis transport failure fails open (request allowed, `warn!` logged):
//! degraded throttling beats a hard outage of every gated endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::Script;
use redis::aio::MultiplexedConnection;
use tracing::warn;

use super::store::{RateLimitDecision, RateLimitStore, unix_now};

const CHECK_SCRIPT: &str = r"
local key = KEYS[1]
local limit = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, 0, now_ms - window_ms)
local current = redis.call('ZCARD', key)

if current < limit then
    redis.call('ZADD', key, now_ms, now_ms .. ':' .. redis.call('INCR', key .. ':seq'))
    redis.call('PEXPIRE', key, window_ms)
    redis.call('PEXPIRE', key .. ':seq', window_ms)
    return {1, limit - current - 1, now_ms + window_ms}
else
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    local reset_ms = now_ms + window_ms
    if oldest[2] then
        reset_ms = tonumber(oldest[2]) + window_ms
    end
    return {0, 0, reset_ms}
end
";

pub struct RedisStore {
    conn: MultiplexedConnection,
    script: Script,
}

impl RedisStore {
    /// Open a multiplexed connection and load the check script.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, script: Script::new(CHECK_SCRIPT) })
    }

    async fn run_check(
        &self,
        key: &str,
        max_requests: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, redis::RedisError> {
        let now_ms = unix_now_ms();
        let mut conn = self.conn.clone();
        let reply: Vec<i64> = self
            .script
            .key(format!("ratelimit:{key}"))
            .arg(i64::from(max_requests))
            .arg(i64::try_from(window.as_millis()).unwrap_or(i64::MAX))
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await?;

        let allowed = reply.first().copied().unwrap_or(1) == 1;
        let remaining = u32::try_from(reply.get(1).copied().unwrap_or(0).max(0)).unwrap_or(0);
        let reset_ms = reply.get(2).copied().unwrap_or(now_ms);

        Ok(RateLimitDecision { allowed, limit: max_requests, remaining, reset_at: reset_ms / 1000 })
    }
}

fn unix_now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[async_trait::async_trait]
impl RateLimitStore for RedisStore {
    async fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitDecision {
        match self.run_check(key, max_requests, window).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, key, "redis rate-limit check failed; failing open");
                RateLimitDecision {
                    allowed: true,
                    limit: max_requests,
                    remaining: max_requests.saturating_sub(1),
                    reset_at: unix_now() + i64::try_from(window.as_secs()).unwrap_or(i64::MAX),
                }
            }
        }
    }

    async fn sweep(&self) {
        // Key expiry is handled server-side by PEXPIRE.
    }
}
