use super::*;

fn memory_limiter() -> RateLimiter {
    RateLimiter::with_store(Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn scopes_partition_the_key_space() {
    let limiter = memory_limiter();

    // Exhaust the checkout scope for one user.
    let mut last = limiter.check(RateScope::Checkout, "user-1").await;
    while last.allowed {
        last = limiter.check(RateScope::Checkout, "user-1").await;
    }

    // Same user is still fine on the chat scope.
    let chat = limiter.check(RateScope::AiChat, "user-1").await;
    assert!(chat.allowed);
}

#[tokio::test]
async fn denied_decision_reports_limit_and_reset() {
    let limiter = memory_limiter();

    let mut last = limiter.check(RateScope::Portal, "user-2").await;
    let limit = last.limit;
    while last.allowed {
        last = limiter.check(RateScope::Portal, "user-2").await;
    }

    assert_eq!(last.limit, limit);
    assert_eq!(last.remaining, 0);
    assert!(last.reset_at > 0);
}

#[test]
fn scope_names_are_stable() {
    assert_eq!(RateScope::AiChat.as_str(), "ai-chat");
    assert_eq!(RateScope::Checkout.as_str(), "checkout");
    assert_eq!(RateScope::Portal.as_str(), "portal");
    assert_eq!(RateScope::Webhook.as_str(), "webhook");
}
