//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds every HTTP endpoint under `/api` onto a single Axum router with
//! CORS and request tracing. The webhook route takes the raw body — it must
//! never pass through a JSON extractor, or signature verification would see
//! re-serialized bytes.

pub mod ai;
pub mod auth;
pub mod billing;
pub mod download;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/ai/usage", get(ai::usage_snapshot))
        .route("/api/ai/conversations", get(ai::list_conversations))
        .route(
            "/api/ai/conversations/{id}",
            get(ai::get_conversation).delete(ai::delete_conversation),
        )
        .route("/api/billing/checkout", post(billing::checkout))
        .route("/api/billing/portal", post(billing::portal))
        .route("/api/billing/webhook", post(billing::webhook))
        .route("/api/download", get(download::download))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
