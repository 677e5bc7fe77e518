//! API error taxonomy.
//!
//! DESIGN
//! ======
//! Every handler returns `Result<_, ApiError>`. The variants map one-to-one
//! onto response classes: validation (400, terminal), auth (401, terminal),
//! quota (429, retryable after `resetAt`), integrity (403, never retryable
//! with the same credential), upstream (502, caller may retry), and internal
//! (500 — for webhooks this is what triggers the provider's redelivery).
//!
//! Quota responses carry `limit`/`remaining`/`resetAt` so clients can back
//! off intelligently instead of hammering the endpoint.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Auth,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("too many requests")]
    RateLimited { limit: u32, remaining: u32, reset_at: i64 },
    #[error("daily message limit reached ({limit} messages)")]
    QuotaExhausted { used: i64, limit: i64 },
    #[error("{0}")]
    Integrity(&'static str),
    #[error("upstream service error: {0}")]
    Upstream(String),
    #[error("{0} not configured")]
    ServiceUnavailable(&'static str),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } | Self::QuotaExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Integrity(_) => StatusCode::FORBIDDEN,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Db(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // 5xx details stay in the logs, not the response body.
        let body = match &self {
            Self::RateLimited { limit, remaining, reset_at } => json!({
                "error": "Too many requests. Please try again later.",
                "limit": limit,
                "remaining": remaining,
                "resetAt": reset_at,
            }),
            Self::QuotaExhausted { used, limit } => json!({
                "error": self.to_string(),
                "used": used,
                "limit": limit,
            }),
            Self::Db(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                json!({ "error": "Internal server error" })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
