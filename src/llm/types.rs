//! LLM types — provider-neutral streaming chat types and errors.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// A stream event could not be deserialized.
    #[error("stream parse failed: {0}")]
    StreamParse(String),

    /// The stream broke or the provider reported an in-stream error.
    #[error("stream failed: {0}")]
    Stream(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// MESSAGES
// =============================================================================

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }
}

// =============================================================================
// STREAM EVENTS
// =============================================================================

/// A provider-neutral event in a streamed chat response.
///
/// Token counts arrive at the edges of the stream: input tokens once near the
/// start, output tokens once near the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    MessageStart { input_tokens: u64 },
    TextDelta { text: String },
    MessageDelta { output_tokens: u64 },
    MessageStop,
}

/// Boxed event stream returned by [`LlmChat::chat_stream`].
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

// =============================================================================
// LLM CHAT TRAIT
// =============================================================================

/// Provider-neutral async trait for streamed LLM chat. Enables mocking in
/// tests.
#[async_trait::async_trait]
pub trait LlmChat: Send + Sync {
    /// Open a streaming chat request to the LLM provider.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request cannot be opened; errors after
    /// the stream starts surface as stream items.
    async fn chat_stream(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatStream, LlmError>;
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
