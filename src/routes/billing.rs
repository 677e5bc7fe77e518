//! Billing routes — hosted checkout, billing portal, webhook ingestion.
//!
//! The webhook handler is deliberately strict about ordering: verify the
//! signature, dedup by event id, apply the mutation, and only then mark the
//! id processed. A processing failure returns 5xx so the provider retries
//! with the id still unmarked.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::Row;
use tracing::error;

use crate::error::ApiError;
use crate::rate_limit::RateScope;
use crate::routes::auth::AuthUser;
use crate::services::billing::{self, BillingError, EventOutcome};
use crate::state::AppState;

fn unix_now() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_secs()).unwrap_or(0)
}

fn rate_limited(decision: crate::rate_limit::RateLimitDecision) -> ApiError {
    ApiError::RateLimited { limit: decision.limit, remaining: decision.remaining, reset_at: decision.reset_at }
}

// =============================================================================
// CHECKOUT
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    price_id: Option<String>,
}

/// `POST /api/billing/checkout` — create a hosted checkout session.
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(stripe), Some(config)) = (&state.stripe, &state.config.stripe) else {
        return Err(ApiError::ServiceUnavailable("billing"));
    };

    let decision = state
        .rate_limiter
        .check(RateScope::Checkout, &auth.user.id.to_string())
        .await;
    if !decision.allowed {
        return Err(rate_limited(decision));
    }

    // Whitelist check happens before any provider call.
    let price_id = req
        .price_id
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("Price ID required".into()))?;
    if !config.allowed_price_ids.iter().any(|allowed| allowed == price_id) {
        return Err(ApiError::Validation("Unknown price ID".into()));
    }

    let url = stripe
        .create_checkout_session(auth.user.id, price_id, &auth.user.email, &state.config.app_base_url)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({ "url": url })))
}

// =============================================================================
// PORTAL
// =============================================================================

/// `POST /api/billing/portal` — create a billing-portal session for an
/// existing customer.
pub async fn portal(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let Some(stripe) = &state.stripe else {
        return Err(ApiError::ServiceUnavailable("billing"));
    };

    let decision = state
        .rate_limiter
        .check(RateScope::Portal, &auth.user.id.to_string())
        .await;
    if !decision.allowed {
        return Err(rate_limited(decision));
    }

    let row = sqlx::query("SELECT stripe_customer_id FROM users WHERE id = $1")
        .bind(auth.user.id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let customer_id: Option<String> = row.get("stripe_customer_id");
    let Some(customer_id) = customer_id else {
        return Err(ApiError::Validation("No billing account".into()));
    };

    let url = stripe
        .create_portal_session(&customer_id, &state.config.app_base_url)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(json!({ "url": url })))
}

// =============================================================================
// WEBHOOK
// =============================================================================

/// `POST /api/billing/webhook` — raw body + provider signature header.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let (Some(stripe), Some(config)) = (&state.stripe, &state.config.stripe) else {
        return Err(ApiError::ServiceUnavailable("billing"));
    };

    // Global throttle on webhook ingestion; the provider backs off on 429.
    let decision = state.rate_limiter.check(RateScope::Webhook, "stripe").await;
    if !decision.allowed {
        return Err(rate_limited(decision));
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing signature header".into()))?;
    billing::verify_webhook_signature(&body, signature, &config.webhook_secret, unix_now())
        .map_err(|_| ApiError::Validation("Invalid signature".into()))?;

    let event = billing::parse_webhook_event(&body).map_err(|e| ApiError::Validation(e.to_string()))?;

    if !state.webhook_cache.should_process(&event.id) {
        return Ok(Json(json!({ "received": true, "cached": true })));
    }

    let outcome = billing::apply_webhook_event(&state.pool, stripe, &event)
        .await
        .map_err(map_billing_error)?;

    // Only a committed mutation makes a redelivery a no-op.
    state.webhook_cache.mark_processed(&event.id);

    if let EventOutcome::Applied { purchaser_email: Some(email) } = &outcome {
        deliver_download_link(&state, email).await;
    }

    Ok(Json(json!({ "received": true })))
}

/// Issue and email the artifact download link after a completed purchase.
/// Best-effort: the account mutation is already committed, so a delivery
/// failure is logged rather than failing the webhook into a redelivery loop.
async fn deliver_download_link(state: &AppState, email: &str) {
    let (Some(download), Some(mailer), Some(config)) = (&state.download, &state.mailer, &state.config.download) else {
        return;
    };

    let token = download.issue(email);
    let url = format!("{}/api/download?token={token}", state.config.app_base_url);
    if let Err(e) = mailer.send_download_link(email, &config.product_name, &url).await {
        error!(error = %e, email, "download link delivery failed");
    }
}

fn map_billing_error(e: BillingError) -> ApiError {
    match e {
        // A body that parsed as an event but carries an unusable object will
        // not improve on retry.
        BillingError::MalformedPayload(msg) => ApiError::Validation(msg),
        BillingError::Db(e) => ApiError::Db(e),
        // Provider-side trouble: answer 5xx so the provider redelivers.
        other => ApiError::Upstream(other.to_string()),
    }
}

#[cfg(test)]
#[path = "billing_routes_test.rs"]
mod tests;
