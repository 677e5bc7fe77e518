//! Usage metering — daily message quota and lifetime token accounting.
//!
//! DESIGN
//! ======
//! The daily counter resets on a rolling 24-hour boundary measured from the
//! account's own `ai_messages_reset_at`, applied lazily on every access.
//! Admission is a single conditional `UPDATE ... WHERE ai_messages_today <
//! limit RETURNING`, so Postgres serializes concurrent requests on the row —
//! two racing requests can never both take the last slot.
//!
//! Token accounting is separate: it is recorded after the completed exchange
//! and never gates admission.

use sqlx::{PgPool, Row};
use uuid::Uuid;

pub const FREE_TIER_DAILY_LIMIT: i64 = 50;
pub const PAID_TIER_DAILY_LIMIT: i64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("user not found")]
    UserNotFound,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Outcome of an admission attempt. `used` already includes this request
/// when `allowed` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageGate {
    pub allowed: bool,
    pub used: i64,
    pub limit: i64,
}

/// Current usage state for the `GET /api/ai/usage` payload.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub messages_used_today: i64,
    pub daily_limit: i64,
    pub total_tokens_used: i64,
    pub has_paid_subscription: bool,
    /// Unix seconds of the current 24h window's anchor.
    pub reset_at: i64,
}

/// Daily message limit for the subscription state.
#[must_use]
pub fn daily_limit(has_paid_subscription: bool) -> i64 {
    if has_paid_subscription { PAID_TIER_DAILY_LIMIT } else { FREE_TIER_DAILY_LIMIT }
}

/// Zero the counter once the rolling 24h window has elapsed. No-op otherwise.
async fn apply_rolling_reset(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"UPDATE users
          SET ai_messages_today = 0, ai_messages_reset_at = now()
          WHERE id = $1 AND now() - ai_messages_reset_at > INTERVAL '24 hours'",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn load_tier(pool: &PgPool, user_id: Uuid) -> Result<bool, UsageError> {
    let row = sqlx::query(
        r"SELECT (stripe_price_id IS NOT NULL
                  AND stripe_current_period_end IS NOT NULL
                  AND stripe_current_period_end > now()) AS has_paid
          FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(UsageError::UserNotFound)?;
    Ok(row.get("has_paid"))
}

/// Admit or reject a message costing `cost` units (normally 1) for the
/// account.
///
/// Applies the lazy rolling reset, resolves the tier limit, then attempts a
/// conditional increment: admitted only while the counter is still below the
/// limit. On rejection the counter is left untouched.
///
/// # Errors
///
/// Returns an error if the user does not exist or the database fails.
pub async fn record_and_check(pool: &PgPool, user_id: Uuid, cost: i64) -> Result<UsageGate, UsageError> {
    apply_rolling_reset(pool, user_id).await?;
    let limit = daily_limit(load_tier(pool, user_id).await?);

    let incremented = sqlx::query(
        r"UPDATE users
          SET ai_messages_today = ai_messages_today + $3
          WHERE id = $1 AND ai_messages_today < $2
          RETURNING ai_messages_today",
    )
    .bind(user_id)
    .bind(limit)
    .bind(i32::try_from(cost).unwrap_or(i32::MAX))
    .fetch_optional(pool)
    .await?;

    if let Some(row) = incremented {
        let used: i32 = row.get("ai_messages_today");
        return Ok(UsageGate { allowed: true, used: i64::from(used), limit });
    }

    let row = sqlx::query("SELECT ai_messages_today FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(UsageError::UserNotFound)?;
    let used: i32 = row.get("ai_messages_today");
    Ok(UsageGate { allowed: false, used: i64::from(used), limit })
}

/// Record token consumption for a completed exchange.
pub async fn record_tokens(pool: &PgPool, user_id: Uuid, total_tokens: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET total_tokens_used = total_tokens_used + $2 WHERE id = $1")
        .bind(user_id)
        .bind(total_tokens)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read current usage state, applying the lazy reset first.
///
/// # Errors
///
/// Returns an error if the user does not exist or the database fails.
pub async fn snapshot(pool: &PgPool, user_id: Uuid) -> Result<UsageSnapshot, UsageError> {
    apply_rolling_reset(pool, user_id).await?;

    let row = sqlx::query(
        r"SELECT ai_messages_today,
                 total_tokens_used,
                 EXTRACT(EPOCH FROM ai_messages_reset_at)::BIGINT AS reset_at,
                 (stripe_price_id IS NOT NULL
                  AND stripe_current_period_end IS NOT NULL
                  AND stripe_current_period_end > now()) AS has_paid
          FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(UsageError::UserNotFound)?;

    let has_paid: bool = row.get("has_paid");
    let used: i32 = row.get("ai_messages_today");
    Ok(UsageSnapshot {
        messages_used_today: i64::from(used),
        daily_limit: daily_limit(has_paid),
        total_tokens_used: row.get("total_tokens_used"),
        has_paid_subscription: has_paid,
        reset_at: row.get("reset_at"),
    })
}

#[cfg(test)]
#[path = "usage_test.rs"]
mod tests;
