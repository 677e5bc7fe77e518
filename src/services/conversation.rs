//! Conversation and message persistence.
//!
//! A conversation belongs to exactly one user; every query here is scoped by
//! owner so a handler can never leak another account's history. Messages are
//! ordered by creation time and deleted only via the owning conversation's
//! cascade.

use sqlx::{PgPool, Row};
use uuid::Uuid;

/// How much of the first message becomes the conversation title.
const TITLE_MAX_CHARS: usize = 50;

/// How many trailing messages are replayed to the model as context.
pub const CONTEXT_MESSAGE_LIMIT: i64 = 20;

/// Derive a display title from the first message (char-safe truncation).
#[must_use]
pub fn derive_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str("...");
    title
}

/// A stored message, serialized for API responses.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub tokens_used: Option<i32>,
    /// Unix seconds.
    pub created_at: i64,
}

/// Conversation list entry with a one-message preview.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub updated_at: i64,
    pub last_message: Option<String>,
}

/// Full conversation payload.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: Uuid,
    pub title: String,
    pub created_at: i64,
    pub messages: Vec<MessageRecord>,
}

/// Create a conversation seeded with its first user message. The title is
/// derived from the message. Returns the new conversation id.
pub async fn create_with_first_message(
    pool: &PgPool,
    user_id: Uuid,
    message: &str,
    system_prompt: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query("INSERT INTO conversations (user_id, title) VALUES ($1, $2) RETURNING id")
        .bind(user_id)
        .bind(derive_title(message))
        .fetch_one(&mut *tx)
        .await?;
    let conversation_id: Uuid = row.get("id");

    sqlx::query("INSERT INTO messages (conversation_id, role, content, system_prompt) VALUES ($1, 'user', $2, $3)")
        .bind(conversation_id)
        .bind(message)
        .bind(system_prompt)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(conversation_id)
}

/// Resolve a conversation id iff it belongs to `user_id`.
pub async fn find_owned(pool: &PgPool, conversation_id: Uuid, user_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("SELECT id FROM conversations WHERE id = $1 AND user_id = $2")
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("id")))
}

/// Append a message and bump the conversation's `updated_at`.
pub async fn append_message(
    pool: &PgPool,
    conversation_id: Uuid,
    role: &str,
    content: &str,
    system_prompt: Option<&str>,
    tokens_used: Option<i32>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO messages (conversation_id, role, content, system_prompt, tokens_used) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(conversation_id)
    .bind(role)
    .bind(content)
    .bind(system_prompt)
    .bind(tokens_used)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE conversations SET updated_at = now() WHERE id = $1")
        .bind(conversation_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Load the last `CONTEXT_MESSAGE_LIMIT` messages in chronological order.
pub async fn recent_messages(pool: &PgPool, conversation_id: Uuid) -> Result<Vec<MessageRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT id, role, content, tokens_used, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at
          FROM (
              SELECT * FROM messages
              WHERE conversation_id = $1
              ORDER BY created_at DESC
              LIMIT $2
          ) recent
          ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .bind(CONTEXT_MESSAGE_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(message_from_row).collect())
}

/// Latest 50 conversations for the user, newest first, with a preview of the
/// most recent message.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ConversationSummary>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT c.id, c.title, EXTRACT(EPOCH FROM c.updated_at)::BIGINT AS updated_at, m.content AS last_message
          FROM conversations c
          LEFT JOIN LATERAL (
              SELECT content FROM messages
              WHERE conversation_id = c.id
              ORDER BY created_at DESC
              LIMIT 1
          ) m ON true
          WHERE c.user_id = $1
          ORDER BY c.updated_at DESC
          LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| ConversationSummary {
            id: r.get("id"),
            title: r.get("title"),
            updated_at: r.get("updated_at"),
            last_message: r.get("last_message"),
        })
        .collect())
}

/// Fetch a conversation with all messages, owner-scoped.
pub async fn fetch_with_messages(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ConversationDetail>, sqlx::Error> {
    let conversation = sqlx::query(
        r"SELECT id, title, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at
          FROM conversations WHERE id = $1 AND user_id = $2",
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(conversation) = conversation else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r"SELECT id, role, content, tokens_used, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at
          FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ConversationDetail {
        id: conversation.get("id"),
        title: conversation.get("title"),
        created_at: conversation.get("created_at"),
        messages: rows.into_iter().map(message_from_row).collect(),
    }))
}

/// Delete a conversation (and, via cascade, its messages) iff owned by
/// `user_id`. Returns whether a row was deleted.
pub async fn delete_owned(pool: &PgPool, conversation_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
        .bind(conversation_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn message_from_row(r: sqlx::postgres::PgRow) -> MessageRecord {
    MessageRecord {
        id: r.get("id"),
        role: r.get("role"),
        content: r.get("content"),
        tokens_used: r.get("tokens_used"),
        created_at: r.get("created_at"),
    }
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
