//! AI chat routes — streaming chat relay, usage, conversation management.
//!
//! DESIGN
//! ======
//! The chat handler admits a request in order: auth → rate limit → input
//! validation → daily-quota increment → conversation resolution. Only then is
//! the upstream model stream opened; failures up to that point are plain
//! JSON errors, failures after it surface as a terminal SSE error frame.
//!
//! The relay forwards each text delta the moment it arrives while
//! accumulating the full text and token counts. On clean completion the
//! assistant message and token usage are persisted, then the final `done`
//! frame is emitted. On upstream error the partial text is discarded — a
//! partial reply is never saved as if it were complete. If the client
//! disconnects, dropping the relay also drops (cancels) the upstream
//! request; the admission increment stands and no tokens are recorded.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::PgPool;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::llm::types::{ChatStream, Message, StreamEvent};
use crate::rate_limit::RateScope;
use crate::routes::auth::AuthUser;
use crate::services::usage::UsageGate;
use crate::services::{conversation, usage};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 4000;
const MAX_SYSTEM_PROMPT_CHARS: usize = 2000;
const MAX_RESPONSE_TOKENS: u32 = 2048;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant integrated into a SaaS application. Provide clear, concise, and accurate responses.";

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub conversation_id: Option<Uuid>,
    pub message: String,
    pub system_prompt: Option<String>,
}

fn validate_chat_request(req: &ChatRequest) -> Result<(), ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("Message is required".into()));
    }
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message exceeds maximum length of {MAX_MESSAGE_CHARS} characters"
        )));
    }
    if let Some(system_prompt) = &req.system_prompt {
        if system_prompt.chars().count() > MAX_SYSTEM_PROMPT_CHARS {
            return Err(ApiError::Validation(format!(
                "System prompt exceeds maximum length of {MAX_SYSTEM_PROMPT_CHARS} characters"
            )));
        }
    }
    Ok(())
}

/// `POST /api/ai/chat` — stream a model response as SSE.
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let Some(llm) = state.llm.clone() else {
        return Err(ApiError::ServiceUnavailable("model API"));
    };

    // Reject early on rate exhaustion, before any database work.
    let decision = state
        .rate_limiter
        .check(RateScope::AiChat, &auth.user.id.to_string())
        .await;
    if !decision.allowed {
        return Err(ApiError::RateLimited {
            limit: decision.limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
        });
    }

    validate_chat_request(&req)?;

    let gate = usage::record_and_check(&state.pool, auth.user.id, 1)
        .await
        .map_err(map_usage_error)?;
    if !gate.allowed {
        return Err(ApiError::QuotaExhausted { used: gate.used, limit: gate.limit });
    }

    let message = req.message.trim();
    let conversation_id = match req.conversation_id {
        Some(id) => {
            conversation::find_owned(&state.pool, id, auth.user.id)
                .await?
                .ok_or(ApiError::NotFound("conversation"))?;
            conversation::append_message(&state.pool, id, "user", message, req.system_prompt.as_deref(), None).await?;
            id
        }
        None => {
            conversation::create_with_first_message(&state.pool, auth.user.id, message, req.system_prompt.as_deref())
                .await?
        }
    };

    let history = conversation::recent_messages(&state.pool, conversation_id).await?;
    let messages: Vec<Message> = history
        .iter()
        .map(|m| Message { role: m.role.clone(), content: m.content.clone() })
        .collect();
    let system = req
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    let upstream = llm
        .chat_stream(MAX_RESPONSE_TOKENS, &system, &messages)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let frames = relay_frames(state.pool.clone(), conversation_id, auth.user.id, gate, upstream)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.to_string())));

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()).into_response())
}

/// Forward upstream events as JSON frames while accumulating text and token
/// counts; persist on clean completion only.
fn relay_frames(
    pool: PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    gate: UsageGate,
    mut upstream: ChatStream,
) -> impl futures::Stream<Item = Value> {
    async_stream::stream! {
        let mut full_text = String::new();
        let mut input_tokens: u64 = 0;
        let mut output_tokens: u64 = 0;

        while let Some(event) = upstream.next().await {
            match event {
                Ok(StreamEvent::TextDelta { text }) => {
                    full_text.push_str(&text);
                    yield json!({ "text": text });
                }
                Ok(StreamEvent::MessageStart { input_tokens: n }) => input_tokens = n,
                Ok(StreamEvent::MessageDelta { output_tokens: n }) => output_tokens = n,
                Ok(StreamEvent::MessageStop) => break,
                Err(e) => {
                    // Partial text is discarded, never saved as a complete reply.
                    warn!(error = %e, %conversation_id, "model stream failed mid-flight");
                    yield json!({ "error": "The model stream failed before completion." });
                    return;
                }
            }
        }

        let total_tokens = input_tokens + output_tokens;
        if let Err(e) = persist_exchange(&pool, conversation_id, user_id, &full_text, total_tokens).await {
            error!(error = %e, %conversation_id, "failed to persist completed exchange");
            yield json!({ "error": "Failed to save the response." });
            return;
        }

        yield json!({
            "done": true,
            "conversationId": conversation_id,
            "tokens": { "input": input_tokens, "output": output_tokens, "total": total_tokens },
            "usage": { "messagesUsedToday": gate.used, "dailyLimit": gate.limit },
        });
    }
}

async fn persist_exchange(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    full_text: &str,
    total_tokens: u64,
) -> Result<(), sqlx::Error> {
    let tokens = i32::try_from(total_tokens).unwrap_or(i32::MAX);
    conversation::append_message(pool, conversation_id, "assistant", full_text, None, Some(tokens)).await?;
    usage::record_tokens(pool, user_id, i64::from(tokens)).await?;
    Ok(())
}

fn map_usage_error(e: usage::UsageError) -> ApiError {
    match e {
        usage::UsageError::UserNotFound => ApiError::NotFound("user"),
        usage::UsageError::Db(e) => ApiError::Db(e),
    }
}

// =============================================================================
// USAGE
// =============================================================================

/// `GET /api/ai/usage` — current quota and token usage.
pub async fn usage_snapshot(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<usage::UsageSnapshot>, ApiError> {
    let snapshot = usage::snapshot(&state.pool, auth.user.id)
        .await
        .map_err(map_usage_error)?;
    Ok(Json(snapshot))
}

// =============================================================================
// CONVERSATIONS
// =============================================================================

/// `GET /api/ai/conversations` — latest conversations with previews.
pub async fn list_conversations(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let conversations = conversation::list_for_user(&state.pool, auth.user.id).await?;
    Ok(Json(json!({ "conversations": conversations })))
}

/// `GET /api/ai/conversations/{id}` — one conversation with all messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let detail = conversation::fetch_with_messages(&state.pool, id, auth.user.id)
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;
    Ok(Json(json!({ "conversation": detail })))
}

/// `DELETE /api/ai/conversations/{id}` — owner-scoped cascade delete.
pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    if !conversation::delete_owned(&state.pool, id, auth.user.id).await? {
        return Err(ApiError::NotFound("conversation"));
    }
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
#[path = "ai_test.rs"]
mod tests;
