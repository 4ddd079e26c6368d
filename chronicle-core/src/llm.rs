//! The chat-model seam.
//!
//! The pipeline needs one capability from a language model: turn a system
//! prompt and a user prompt into text. `OpenAiModel` provides it over the
//! `chat` client; tests use `testing::MockModel`.

use crate::config::CompressionConfig;
use async_trait::async_trait;
use chat::{Chat, Message, Request};
use thiserror::Error;

/// Errors from a model call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Chat API error: {0}")]
    Api(#[from] chat::Error),

    #[error("Model returned an empty reply")]
    EmptyReply,

    #[error("Model error: {0}")]
    Other(String),
}

impl LlmError {
    /// Whether another attempt might succeed.
    ///
    /// API errors defer to the client's classification, so an auth failure
    /// or an unknown model is not retried.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Api(e) => e.is_transient(),
            LlmError::EmptyReply | LlmError::Other(_) => true,
        }
    }
}

/// A text-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete a system + user prompt pair.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Identifier recorded in compression metadata.
    fn model_name(&self) -> &str;
}

/// `ChatModel` backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiModel {
    client: Chat,
    model: String,
    temperature: f32,
    max_tokens: Option<usize>,
}

impl OpenAiModel {
    pub fn new(client: Chat, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Build from OPENAI_API_KEY using the model settings in `config`.
    pub fn from_env(config: &CompressionConfig) -> Result<Self, LlmError> {
        let client = Chat::from_env()?;
        Ok(Self::from_config(client, config))
    }

    pub fn from_config(client: Chat, config: &CompressionConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let mut request = Request::new(vec![Message::user(user)])
            .with_system(system)
            .with_model(&self.model)
            .with_temperature(self.temperature);

        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.complete(request).await?;
        tracing::debug!(
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "chat completion finished"
        );

        let text = response.text();
        if text.is_empty() {
            return Err(LlmError::EmptyReply);
        }
        Ok(text.to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let unauthorized = LlmError::Api(chat::Error::Api {
            status: 401,
            message: "invalid api key".into(),
        });
        let overloaded = LlmError::Api(chat::Error::Api {
            status: 503,
            message: "overloaded".into(),
        });

        assert!(!unauthorized.is_transient());
        assert!(!LlmError::Api(chat::Error::NoApiKey).is_transient());
        assert!(overloaded.is_transient());
        assert!(LlmError::EmptyReply.is_transient());
    }

    #[test]
    fn test_from_config_copies_model_settings() {
        let config = CompressionConfig::new()
            .with_model("gpt-4o")
            .with_temperature(0.2);
        let model = OpenAiModel::from_config(Chat::new("key"), &config);

        assert_eq!(model.model_name(), "gpt-4o");
        assert_eq!(model.temperature, 0.2);
        assert!(model.max_tokens.is_none());
    }
}
