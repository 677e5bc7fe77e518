//! Auth routes — email access-code login and session management.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use time::Duration;

use crate::error::ApiError;
use crate::services::{email_auth, session};
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn cookie_secure() -> bool {
    if let Some(value) = env_bool("COOKIE_SECURE") {
        return value;
    }

    std::env::var("APP_BASE_URL")
        .map(|url| url.starts_with("https://"))
        .unwrap_or(false)
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(secure)
        .build()
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::Auth);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await?
            .ok_or(ApiError::Auth)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    email: String,
}

/// `POST /api/auth/email/request-code` — create and deliver an access code.
pub async fn request_email_code(
    State(state): State<AppState>,
    Json(body): Json<RequestCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let code = email_auth::request_code(&state.pool, &body.email)
        .await
        .map_err(map_email_auth_error)?;

    if let Some(mailer) = &state.mailer {
        let normalized = email_auth::normalize_email(&body.email).unwrap_or_default();
        mailer
            .send_login_code(&normalized, &code)
            .await
            .map_err(|e| ApiError::Upstream(e.to_string()))?;
    } else {
        // Dev fallback when no email provider is configured.
        tracing::info!(email = %body.email, code = %code, "email delivery not configured; access code logged");
    }

    Ok(Json(json!({ "sent": true })))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    email: String,
    code: String,
}

/// `POST /api/auth/email/verify-code` — consume a code, create a session,
/// set the cookie.
pub async fn verify_email_code(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<VerifyCodeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = email_auth::verify_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(map_email_auth_error)?;

    let token = session::create_session(&state.pool, user_id).await?;
    let user = session::validate_session(&state.pool, &token)
        .await?
        .ok_or(ApiError::Auth)?;

    let jar = jar.add(session_cookie(token, cookie_secure()));
    Ok((jar, Json(user)))
}

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;

    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(cookie_secure())
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

fn map_email_auth_error(e: email_auth::EmailAuthError) -> ApiError {
    match e {
        email_auth::EmailAuthError::InvalidEmail | email_auth::EmailAuthError::InvalidCode => {
            ApiError::Validation(e.to_string())
        }
        email_auth::EmailAuthError::VerificationFailed => ApiError::Auth,
        email_auth::EmailAuthError::Db(e) => ApiError::Db(e),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
