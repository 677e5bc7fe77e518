use super::*;
use crate::llm::types::LlmError;
use crate::state::test_helpers;

fn request(message: &str, system_prompt: Option<&str>) -> ChatRequest {
    ChatRequest {
        conversation_id: None,
        message: message.to_string(),
        system_prompt: system_prompt.map(str::to_string),
    }
}

// =========================================================================
// validation
// =========================================================================

#[test]
fn empty_message_is_rejected() {
    assert!(matches!(
        validate_chat_request(&request("   ", None)),
        Err(ApiError::Validation(_))
    ));
}

#[test]
fn message_at_limit_passes() {
    let message = "a".repeat(MAX_MESSAGE_CHARS);
    assert!(validate_chat_request(&request(&message, None)).is_ok());
}

#[test]
fn oversized_message_is_rejected() {
    let message = "a".repeat(MAX_MESSAGE_CHARS + 1);
    assert!(matches!(
        validate_chat_request(&request(&message, None)),
        Err(ApiError::Validation(_))
    ));
}

#[test]
fn limits_count_chars_not_bytes() {
    // 4000 multibyte chars exceed 4000 bytes but are within the char limit.
    let message = "é".repeat(MAX_MESSAGE_CHARS);
    assert!(validate_chat_request(&request(&message, None)).is_ok());
}

#[test]
fn oversized_system_prompt_is_rejected() {
    let system = "s".repeat(MAX_SYSTEM_PROMPT_CHARS + 1);
    assert!(matches!(
        validate_chat_request(&request("hi", Some(&system))),
        Err(ApiError::Validation(_))
    ));
}

#[test]
fn chat_request_accepts_camel_case_fields() {
    let req: ChatRequest = serde_json::from_str(
        r#"{"conversationId":"0191d5a0-0000-7000-8000-000000000000","message":"hi","systemPrompt":"be brief"}"#,
    )
    .unwrap();
    assert!(req.conversation_id.is_some());
    assert_eq!(req.system_prompt.as_deref(), Some("be brief"));
}

// =========================================================================
// relay
// =========================================================================

fn mock_upstream(events: Vec<Result<StreamEvent, LlmError>>) -> ChatStream {
    Box::pin(futures::stream::iter(events))
}

fn test_gate() -> UsageGate {
    UsageGate { allowed: true, used: 5, limit: 50 }
}

#[tokio::test]
async fn upstream_error_yields_error_frame_and_stops() {
    let state = test_helpers::test_app_state();
    let upstream = mock_upstream(vec![
        Ok(StreamEvent::MessageStart { input_tokens: 12 }),
        Ok(StreamEvent::TextDelta { text: "Hel".into() }),
        Ok(StreamEvent::TextDelta { text: "lo".into() }),
        Err(LlmError::Stream("connection reset".into())),
    ]);

    let frames: Vec<Value> = relay_frames(state.pool.clone(), Uuid::new_v4(), Uuid::new_v4(), test_gate(), upstream)
        .collect()
        .await;

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0]["text"], "Hel");
    assert_eq!(frames[1]["text"], "lo");
    assert!(frames[2]["error"].is_string());
    // No `done` frame: the partial reply was discarded, not persisted.
    assert!(frames.iter().all(|f| f.get("done").is_none()));
}

#[tokio::test]
async fn provider_error_before_any_text_still_reports() {
    let state = test_helpers::test_app_state();
    let upstream = mock_upstream(vec![Err(LlmError::Stream("overloaded".into()))]);

    let frames: Vec<Value> = relay_frames(state.pool.clone(), Uuid::new_v4(), Uuid::new_v4(), test_gate(), upstream)
        .collect()
        .await;

    assert_eq!(frames.len(), 1);
    assert!(frames[0]["error"].is_string());
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::conversation;
    use crate::state::test_helpers::live_pool;
    use sqlx::Row;

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
    async fn clean_completion_persists_and_emits_done() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;
        let conversation_id = conversation::create_with_first_message(&pool, user_id, "hello", None)
            .await
            .unwrap();

        let upstream = mock_upstream(vec![
            Ok(StreamEvent::MessageStart { input_tokens: 10 }),
            Ok(StreamEvent::TextDelta { text: "Hi ".into() }),
            Ok(StreamEvent::TextDelta { text: "there".into() }),
            Ok(StreamEvent::MessageDelta { output_tokens: 7 }),
            Ok(StreamEvent::MessageStop),
        ]);

        let frames: Vec<Value> = relay_frames(pool.clone(), conversation_id, user_id, test_gate(), upstream)
            .collect()
            .await;

        let done = frames.last().unwrap();
        assert_eq!(done["done"], true);
        assert_eq!(done["tokens"]["input"], 10);
        assert_eq!(done["tokens"]["output"], 7);
        assert_eq!(done["tokens"]["total"], 17);
        assert_eq!(done["usage"]["dailyLimit"], 50);

        let detail = conversation::fetch_with_messages(&pool, conversation_id, user_id)
            .await
            .unwrap()
            .unwrap();
        let assistant = detail.messages.last().unwrap();
        assert_eq!(assistant.role, "assistant");
        assert_eq!(assistant.content, "Hi there");
        assert_eq!(assistant.tokens_used, Some(17));

        let tokens: i64 = sqlx::query("SELECT total_tokens_used FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap()
            .get("total_tokens_used");
        assert_eq!(tokens, 17);
    }

    #[tokio::test]
    async fn upstream_error_persists_nothing() {
        let pool = live_pool().await;
        let user_id = seed_user(&pool).await;
        let conversation_id = conversation::create_with_first_message(&pool, user_id, "hello", None)
            .await
            .unwrap();

        let upstream = mock_upstream(vec![
            Ok(StreamEvent::TextDelta { text: "partial".into() }),
            Err(LlmError::Stream("reset".into())),
        ]);

        let _frames: Vec<Value> = relay_frames(pool.clone(), conversation_id, user_id, test_gate(), upstream)
            .collect()
            .await;

        let detail = conversation::fetch_with_messages(&pool, conversation_id, user_id)
            .await
            .unwrap()
            .unwrap();
        // Only the seeded user message; the partial assistant reply was discarded.
        assert_eq!(detail.messages.len(), 1);
        assert_eq!(detail.messages[0].role, "user");
    }
}
