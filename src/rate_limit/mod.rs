//! Sliding-window rate limiting for the gated endpoints.
//!
//! DESIGN
//! ======
//! Four scopes, one per gated endpoint (AI chat, checkout, billing portal,
//! webhook ingestion), each keyed by caller identity. The backing store is
//! chosen exactly once at startup via [`RateLimiter::connect`]: Redis when
//! `REDIS_URL` is configured, otherwise the in-process map. Handlers hold a
//! single `RateLimiter` and never branch on which store is underneath —
//! running multiple instances on the in-process store silently limits per
//! instance, which is why `connect` logs a warning for that configuration.

pub mod redis;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

pub use store::{MemoryStore, RateLimitDecision, RateLimitStore};

const DEFAULT_AI_CHAT_LIMIT: u32 = 10;
const DEFAULT_CHECKOUT_LIMIT: u32 = 5;
const DEFAULT_PORTAL_LIMIT: u32 = 5;
const DEFAULT_WEBHOOK_LIMIT: u32 = 120;
const DEFAULT_WINDOW_SECS: u64 = 60;

/// Which gated endpoint a check is for. Scopes partition the key space so a
/// caller exhausting one endpoint cannot starve another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    AiChat,
    Checkout,
    Portal,
    Webhook,
}

impl RateScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AiChat => "ai-chat",
            Self::Checkout => "checkout",
            Self::Portal => "portal",
            Self::Webhook => "webhook",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScopePolicy {
    max_requests: u32,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitConfig {
    ai_chat: ScopePolicy,
    checkout: ScopePolicy,
    portal: ScopePolicy,
    webhook: ScopePolicy,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        let window = Duration::from_secs(env_parse("RATE_LIMIT_WINDOW_SECS", DEFAULT_WINDOW_SECS));
        Self {
            ai_chat: ScopePolicy { max_requests: env_parse("RATE_LIMIT_AI_CHAT", DEFAULT_AI_CHAT_LIMIT), window },
            checkout: ScopePolicy { max_requests: env_parse("RATE_LIMIT_CHECKOUT", DEFAULT_CHECKOUT_LIMIT), window },
            portal: ScopePolicy { max_requests: env_parse("RATE_LIMIT_PORTAL", DEFAULT_PORTAL_LIMIT), window },
            webhook: ScopePolicy { max_requests: env_parse("RATE_LIMIT_WEBHOOK", DEFAULT_WEBHOOK_LIMIT), window },
        }
    }

    fn policy(&self, scope: RateScope) -> ScopePolicy {
        match scope {
            RateScope::AiChat => self.ai_chat,
            RateScope::Checkout => self.checkout,
            RateScope::Portal => self.portal,
            RateScope::Webhook => self.webhook,
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Single strategy-selection point: Redis when a URL is configured,
    /// in-process otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if Redis is configured but unreachable — a partially
    /// coordinated fleet is worse than failing fast at startup.
    pub async fn connect(redis_url: Option<&str>) -> Result<Self, ::redis::RedisError> {
        let store: Arc<dyn RateLimitStore> = match redis_url {
            Some(url) => {
                let store = redis::RedisStore::connect(url).await?;
                tracing::info!("rate limiting backed by redis");
                Arc::new(store)
            }
            None => {
                tracing::warn!("rate limiting is in-process only; counters do not coordinate across instances");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(store))
    }

    #[must_use]
    pub fn with_store(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store, config: RateLimitConfig::from_env() }
    }

    /// Check and record a request for `key` within `scope`.
    pub async fn check(&self, scope: RateScope, key: &str) -> RateLimitDecision {
        let policy = self.config.policy(scope);
        self.store
            .check(&format!("{}:{key}", scope.as_str()), policy.max_requests, policy.window)
            .await
    }

    /// Prune state that no longer affects any window.
    pub async fn sweep(&self) {
        self.store.sweep().await;
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
