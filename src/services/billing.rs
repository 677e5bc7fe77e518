//! Billing — payment-provider client and webhook event handling.
//!
//! ARCHITECTURE
//! ============
//! One billing model: subscription checkout. The provider is the source of
//! truth for subscription state; this service mirrors it into the `users`
//! table when webhooks arrive. All provider calls are plain form POSTs / GETs
//! against the REST API via `reqwest` — no SDK.
//!
//! Webhook authenticity: the `Stripe-Signature` header carries a timestamp
//! and one or more HMAC-SHA256 tags over `"{timestamp}.{raw_body}"`. Tags are
//! checked with `ring`'s constant-time `hmac::verify`, and the timestamp must
//! be within a fixed tolerance to blunt replay.

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ring::hmac;

/// Maximum accepted distance between the signature timestamp and now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("webhook timestamp outside tolerance")]
    StaleTimestamp,
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),
    #[error("stripe request failed: {0}")]
    Request(String),
    #[error("stripe api error: status {status}")]
    Api { status: u16, body: String },
    #[error("unexpected stripe response: {0}")]
    Parse(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// SIGNATURE VERIFICATION
// =============================================================================

/// Verify a provider signature header against the raw request body.
///
/// # Errors
///
/// Returns an error for a malformed header, a stale timestamp, or when no
/// candidate tag matches.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), BillingError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Some(bytes) = hex_to_bytes(value) {
                    candidates.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(BillingError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(BillingError::MalformedHeader);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(BillingError::StaleTimestamp);
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);

    for candidate in &candidates {
        if hmac::verify(&key, &signed, candidate).is_ok() {
            return Ok(());
        }
    }
    Err(BillingError::InvalidSignature)
}

/// Compute the `v1` tag for a payload; used to construct test signatures.
#[must_use]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);
    let tag = hmac::sign(&key, &signed);
    crate::services::session::bytes_to_hex(tag.as_ref())
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

// =============================================================================
// EVENTS
// =============================================================================

/// A webhook event envelope. `object` stays loosely typed; each handler
/// extracts only the fields it needs.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

/// Parse the raw webhook body.
///
/// # Errors
///
/// Returns an error if the body is not a well-formed event envelope.
pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, BillingError> {
    serde_json::from_slice(payload).map_err(|e| BillingError::MalformedPayload(e.to_string()))
}

fn object_str<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

// =============================================================================
// STRIPE CLIENT
// =============================================================================

#[derive(Debug, Deserialize)]
struct HostedSessionResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    id: String,
    current_period_end: i64,
    items: SubscriptionItems,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItems {
    data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItem {
    price: PriceRef,
}

#[derive(Debug, Deserialize)]
struct PriceRef {
    id: String,
}

/// Subscription state mirrored into the `users` table.
#[derive(Debug, Clone)]
pub struct SubscriptionInfo {
    pub id: String,
    pub price_id: String,
    /// Unix seconds.
    pub current_period_end: i64,
}

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    #[must_use]
    pub fn new(secret_key: String, base_url: String) -> Self {
        Self { http: reqwest::Client::new(), secret_key, base_url }
    }

    /// Create a hosted subscription-checkout session and return its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails or the response is
    /// unexpected.
    pub async fn create_checkout_session(
        &self,
        user_id: Uuid,
        price_id: &str,
        email: &str,
        app_base_url: &str,
    ) -> Result<String, BillingError> {
        let user_id = user_id.to_string();
        let success_url = format!("{app_base_url}/dashboard?success=true");
        let cancel_url = format!("{app_base_url}/pricing?canceled=true");
        let form = [
            ("mode", "subscription"),
            ("line_items[0][price]", price_id),
            ("line_items[0][quantity]", "1"),
            ("success_url", success_url.as_str()),
            ("cancel_url", cancel_url.as_str()),
            ("customer_email", email),
            ("metadata[user_id]", user_id.as_str()),
        ];

        let session: HostedSessionResponse = self.post_form("/v1/checkout/sessions", &form).await?;
        Ok(session.url)
    }

    /// Create a billing-portal session for an existing customer.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails or the response is
    /// unexpected.
    pub async fn create_portal_session(&self, customer_id: &str, app_base_url: &str) -> Result<String, BillingError> {
        let return_url = format!("{app_base_url}/dashboard");
        let form = [("customer", customer_id), ("return_url", return_url.as_str())];

        let session: HostedSessionResponse = self.post_form("/v1/billing_portal/sessions", &form).await?;
        Ok(session.url)
    }

    /// Fetch the current state of a subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider call fails or the subscription has no
    /// priced item.
    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionInfo, BillingError> {
        let response = self
            .http
            .get(format!("{}/v1/subscriptions/{subscription_id}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| BillingError::Request(e.to_string()))?;

        let sub: SubscriptionResponse = read_json(response).await?;
        let price_id = sub
            .items
            .data
            .first()
            .map(|item| item.price.id.clone())
            .ok_or_else(|| BillingError::Parse("subscription has no items".into()))?;

        Ok(SubscriptionInfo { id: sub.id, price_id, current_period_end: sub.current_period_end })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, BillingError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| BillingError::Request(e.to_string()))?;

        read_json(response).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, BillingError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| BillingError::Request(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(BillingError::Api { status, body });
    }
    serde_json::from_str(&body).map_err(|e| BillingError::Parse(e.to_string()))
}

// =============================================================================
// EVENT APPLICATION
// =============================================================================

/// What the webhook route should do after applying an event; carried back so
/// post-commit work (delivery email) happens outside the DB path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Account state changed; `purchaser_email` is set when a completed
    /// checkout should trigger artifact delivery.
    Applied { purchaser_email: Option<String> },
    /// Recognized-but-irrelevant or unknown event type.
    Ignored,
}

/// Apply a verified webhook event to account state.
///
/// # Errors
///
/// Returns an error when the provider or database fails mid-application —
/// the route maps that to a 5xx so the provider redelivers.
pub async fn apply_webhook_event(
    pool: &PgPool,
    stripe: &StripeClient,
    event: &WebhookEvent,
) -> Result<EventOutcome, BillingError> {
    let object = &event.data.object;

    match event.kind.as_str() {
        "checkout.session.completed" => {
            let Some(subscription_id) = object_str(object, "subscription") else {
                warn!(event_id = %event.id, "checkout completed without a subscription; ignoring");
                return Ok(EventOutcome::Ignored);
            };
            let user_id = object
                .get("metadata")
                .and_then(|m| object_str(m, "user_id"))
                .and_then(|raw| Uuid::parse_str(raw).ok());
            let Some(user_id) = user_id else {
                warn!(event_id = %event.id, "checkout completed without a user_id in metadata; ignoring");
                return Ok(EventOutcome::Ignored);
            };
            let customer_id = object_str(object, "customer");

            let sub = stripe.retrieve_subscription(subscription_id).await?;
            sqlx::query(
                r"UPDATE users
                  SET stripe_customer_id = $2,
                      stripe_subscription_id = $3,
                      stripe_price_id = $4,
                      stripe_current_period_end = to_timestamp($5)
                  WHERE id = $1",
            )
            .bind(user_id)
            .bind(customer_id)
            .bind(&sub.id)
            .bind(&sub.price_id)
            .bind(sub.current_period_end)
            .execute(pool)
            .await?;

            info!(event_id = %event.id, %user_id, price_id = %sub.price_id, "subscription activated");
            let purchaser_email = object
                .get("customer_details")
                .and_then(|d| object_str(d, "email"))
                .map(str::to_string);
            Ok(EventOutcome::Applied { purchaser_email })
        }

        "invoice.payment_succeeded" => {
            let Some(subscription_id) = object_str(object, "subscription") else {
                return Ok(EventOutcome::Ignored);
            };

            let sub = stripe.retrieve_subscription(subscription_id).await?;
            sqlx::query(
                r"UPDATE users
                  SET stripe_price_id = $2,
                      stripe_current_period_end = to_timestamp($3)
                  WHERE stripe_subscription_id = $1",
            )
            .bind(&sub.id)
            .bind(&sub.price_id)
            .bind(sub.current_period_end)
            .execute(pool)
            .await?;

            info!(event_id = %event.id, subscription_id = %sub.id, "subscription renewed");
            Ok(EventOutcome::Applied { purchaser_email: None })
        }

        "customer.subscription.deleted" => {
            let Some(subscription_id) = object_str(object, "id") else {
                return Err(BillingError::MalformedPayload("subscription object without id".into()));
            };

            sqlx::query(
                r"UPDATE users
                  SET stripe_subscription_id = NULL,
                      stripe_price_id = NULL,
                      stripe_current_period_end = NULL
                  WHERE stripe_subscription_id = $1",
            )
            .bind(subscription_id)
            .execute(pool)
            .await?;

            info!(event_id = %event.id, subscription_id, "subscription cancelled");
            Ok(EventOutcome::Applied { purchaser_email: None })
        }

        other => {
            debug!(event_id = %event.id, kind = other, "ignoring webhook event type");
            Ok(EventOutcome::Ignored)
        }
    }
}

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;
