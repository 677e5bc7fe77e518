//! LLM — hosted-model adapter for the AI chat feature.
//!
//! DESIGN
//! ======
//! `LlmClient` wraps the Anthropic streaming client behind the provider-
//! neutral [`LlmChat`] trait so the chat route and tests never touch wire
//! details. Configured from environment variables; absence of an API key
//! disables AI features rather than failing startup.

pub mod anthropic;
pub mod config;
pub mod types;

use config::LlmConfig;
pub use types::LlmChat;
use types::{ChatStream, LlmError, Message};

/// Concrete LLM client bound to a model name.
pub struct LlmClient {
    inner: anthropic::AnthropicClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = anthropic::AnthropicClient::new(config.api_key, config.timeouts)?;
        Ok(Self { inner, model: config.model })
    }

    /// Return the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat_stream(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<ChatStream, LlmError> {
        self.inner
            .chat_stream(&self.model, max_tokens, system, messages)
            .await
    }
}
