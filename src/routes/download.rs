//! Download route — redeem a signed capability token for the artifact.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::ApiError;
use crate::services::download::DownloadTokenError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DownloadQuery {
    token: Option<String>,
}

/// `GET /api/download?token=...` — verify the capability and redirect to the
/// artifact. The token is multi-use until expiry; no state is consumed.
pub async fn download(State(state): State<AppState>, Query(query): Query<DownloadQuery>) -> Result<Response, ApiError> {
    let (Some(tokens), Some(config)) = (&state.download, &state.config.download) else {
        return Err(ApiError::ServiceUnavailable("download"));
    };

    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing token".into()))?;

    match tokens.verify(token) {
        Ok(_claims) => Ok((StatusCode::FOUND, [(header::LOCATION, config.artifact_url.clone())]).into_response()),
        Err(DownloadTokenError::Malformed) => Err(ApiError::Validation("Invalid token".into())),
        Err(DownloadTokenError::InvalidSignature | DownloadTokenError::Expired) => {
            Err(ApiError::Integrity("Invalid or expired token"))
        }
    }
}
