//! Anthropic Messages API streaming client.
//!
//! DESIGN
//! ======
//! Thin HTTP wrapper for `/v1/messages` with `stream: true`. The SSE body is
//! consumed chunk by chunk from `bytes_stream`; complete `data:` lines are
//! parsed into provider-neutral [`StreamEvent`]s. Pure parsing lives in
//! `parse_event` for testability.

use futures::StreamExt;
use std::time::Duration;

use super::config::LlmTimeouts;
use super::types::{ChatStream, LlmError, Message, StreamEvent};

const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Upper bound on buffered, not-yet-terminated SSE line data.
const MAX_SSE_BUFFER_BYTES: usize = 1024 * 1024;

// =============================================================================
// CLIENT
// =============================================================================

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Build the client with configured timeouts.
    ///
    /// The request timeout is intentionally not set on the shared client:
    /// streamed responses legitimately outlive any fixed request deadline, so
    /// only the connect timeout applies.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(api_key: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { http, api_key, base_url })
    }

    /// Open a streaming chat request and return the parsed event stream.
    pub async fn chat_stream(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
    ) -> Result<ChatStream, LlmError> {
        let body = ApiRequest { model, max_tokens, system, messages, stream: true };

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiResponse { status, body: text });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut buffer = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(LlmError::Stream(e.to_string()));
                        return;
                    }
                };

                if buffer.len() + chunk.len() > MAX_SSE_BUFFER_BYTES {
                    yield Err(LlmError::Stream("SSE buffer exceeded maximum size".into()));
                    return;
                }
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete lines; a trailing partial line stays buffered.
                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].trim().to_string();
                    buffer.drain(..=newline_pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };

                    match parse_event(data.trim_start()) {
                        Ok(Some(event)) => {
                            let stop = matches!(event, StreamEvent::MessageStop);
                            yield Ok(event);
                            if stop {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(serde::Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "message_start")]
    MessageStart { message: WireMessageStart },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: WireDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { usage: WireDeltaUsage },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "error")]
    Error { error: WireError },
    #[serde(other)]
    Other,
}

#[derive(serde::Deserialize)]
struct WireMessageStart {
    usage: WireUsage,
}

#[derive(serde::Deserialize)]
struct WireUsage {
    input_tokens: u64,
}

#[derive(serde::Deserialize)]
#[serde(tag = "type")]
enum WireDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(serde::Deserialize)]
struct WireDeltaUsage {
    output_tokens: u64,
}

#[derive(serde::Deserialize)]
struct WireError {
    message: String,
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one SSE `data:` payload into a neutral event. `None` for event
/// types downstream logic does not care about (ping, content_block_start,
/// non-text deltas, ...).
fn parse_event(data: &str) -> Result<Option<StreamEvent>, LlmError> {
    let wire: WireEvent = serde_json::from_str(data).map_err(|e| LlmError::StreamParse(e.to_string()))?;

    Ok(match wire {
        WireEvent::MessageStart { message } => {
            Some(StreamEvent::MessageStart { input_tokens: message.usage.input_tokens })
        }
        WireEvent::ContentBlockDelta { delta: WireDelta::TextDelta { text } } => Some(StreamEvent::TextDelta { text }),
        WireEvent::ContentBlockDelta { delta: WireDelta::Other } => None,
        WireEvent::MessageDelta { usage } => Some(StreamEvent::MessageDelta { output_tokens: usage.output_tokens }),
        WireEvent::MessageStop => Some(StreamEvent::MessageStop),
        WireEvent::Error { error } => return Err(LlmError::Stream(error.message)),
        WireEvent::Other => None,
    })
}

#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;
