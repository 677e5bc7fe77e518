use super::*;

#[test]
fn tier_limits() {
    assert_eq!(daily_limit(false), FREE_TIER_DAILY_LIMIT);
    assert_eq!(daily_limit(true), PAID_TIER_DAILY_LIMIT);
}

#[test]
fn snapshot_serializes_camel_case() {
    let snap = UsageSnapshot {
        messages_used_today: 3,
        daily_limit: 50,
        total_tokens_used: 1200,
        has_paid_subscription: false,
        reset_at: 1_700_000_000,
    };
    let json = serde_json::to_value(&snap).unwrap();
    assert_eq!(json["messagesUsedToday"], 3);
    assert_eq!(json["dailyLimit"], 50);
    assert_eq!(json["totalTokensUsed"], 1200);
    assert_eq!(json["hasPaidSubscription"], false);
    assert_eq!(json["resetAt"], 1_700_000_000);
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::state::test_helpers::live_pool;
    use sqlx::Row;
    use uuid::Uuid;

    async fn seed_user(pool: &sqlx::PgPool) -> Uuid {
        let row = sqlx::query("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id")
            .bind(format!("{}@example.com", Uuid::new_v4()))
            .bind("tester")
            .fetch_one(pool)
            .await
            .unwrap();
        row.get("id")
    }

    #[tokio::test]
    async fn counter_stops_exactly_at_the_limit() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        // Park the counter one below the free limit.
        sqlx::query("UPDATE users SET ai_messages_today = $2 WHERE id = $1")
            .bind(user_id)
            .bind(i32::try_from(FREE_TIER_DAILY_LIMIT - 1).unwrap())
            .execute(&pool)
            .await
            .unwrap();

        let gate = record_and_check(&pool, user_id, 1).await.unwrap();
        assert!(gate.allowed);
        assert_eq!(gate.used, FREE_TIER_DAILY_LIMIT);

        let denied = record_and_check(&pool, user_id, 1).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.used, FREE_TIER_DAILY_LIMIT);
        assert_eq!(denied.limit, FREE_TIER_DAILY_LIMIT);
    }

    #[tokio::test]
    async fn concurrent_attempts_never_overshoot() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        sqlx::query("UPDATE users SET ai_messages_today = $2 WHERE id = $1")
            .bind(user_id)
            .bind(i32::try_from(FREE_TIER_DAILY_LIMIT - 1).unwrap())
            .execute(&pool)
            .await
            .unwrap();

        let attempts = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { record_and_check(&pool, user_id, 1).await.unwrap() })
            })
            .collect::<Vec<_>>();

        let mut admitted = 0;
        for handle in attempts {
            if handle.await.unwrap().allowed {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);

        let snap = snapshot(&pool, user_id).await.unwrap();
        assert_eq!(snap.messages_used_today, FREE_TIER_DAILY_LIMIT);
    }

    #[tokio::test]
    async fn stale_reset_anchor_zeroes_the_counter() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        sqlx::query(
            "UPDATE users SET ai_messages_today = 40, ai_messages_reset_at = now() - INTERVAL '25 hours' WHERE id = $1",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        let snap = snapshot(&pool, user_id).await.unwrap();
        assert_eq!(snap.messages_used_today, 0);
    }

    #[tokio::test]
    async fn paid_tier_selected_from_subscription_fields() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        sqlx::query(
            r"UPDATE users
              SET stripe_price_id = 'price_pro',
                  stripe_current_period_end = now() + INTERVAL '30 days'
              WHERE id = $1",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        let snap = snapshot(&pool, user_id).await.unwrap();
        assert!(snap.has_paid_subscription);
        assert_eq!(snap.daily_limit, PAID_TIER_DAILY_LIMIT);

        let gate = record_and_check(&pool, user_id, 1).await.unwrap();
        assert_eq!(gate.limit, PAID_TIER_DAILY_LIMIT);
    }

    #[tokio::test]
    async fn expired_subscription_falls_back_to_free() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        sqlx::query(
            r"UPDATE users
              SET stripe_price_id = 'price_pro',
                  stripe_current_period_end = now() - INTERVAL '1 day'
              WHERE id = $1",
        )
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        let snap = snapshot(&pool, user_id).await.unwrap();
        assert!(!snap.has_paid_subscription);
        assert_eq!(snap.daily_limit, FREE_TIER_DAILY_LIMIT);
    }

    #[tokio::test]
    async fn token_recording_accumulates() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;

        record_tokens(&pool, user_id, 150).await.unwrap();
        record_tokens(&pool, user_id, 50).await.unwrap();

        let snap = snapshot(&pool, user_id).await.unwrap();
        assert_eq!(snap.total_tokens_used, 200);
    }
}
