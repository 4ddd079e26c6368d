//! Minimal OpenAI chat-completions client.
//!
//! This crate provides a focused client for the Chat Completions API:
//! - Non-streaming completions only
//! - System/user/assistant text messages
//! - Configurable model, temperature and base URL (for compatible servers)

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Errors that can occur when using the chat client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether retrying the same request might succeed.
    ///
    /// Network failures, rate limits and server-side errors are transient;
    /// authentication and malformed-request errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Error::Parse(_) => true,
            Error::NoApiKey | Error::Config(_) => false,
        }
    }
}

/// Chat completions client.
#[derive(Clone)]
pub struct Chat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl Chat {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE.to_string(),
        }
    }

    /// Create a client from the OPENAI_API_KEY environment variable.
    ///
    /// OPENAI_BASE_URL, when set, points the client at a compatible server.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::NoApiKey)?;
        let mut chat = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            chat = chat.with_base_url(base_url);
        }
        Ok(chat)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at a different API root (no trailing slash needed).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The model used when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        self.parse_response(api_response)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        if self.api_key.is_empty() {
            return Err(Error::NoApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(ref system) = request.system {
            messages.push(ApiMessage {
                role: Role::System.as_str().to_string(),
                content: system.clone(),
            });
        }

        messages.extend(request.messages.iter().map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn parse_response(&self, api_response: ApiResponse) -> Result<Response, Error> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("response contained no choices".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        let usage = api_response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Response {
            id: api_response.id,
            model: api_response.model,
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage,
        })
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: Option<usize>,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: None,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Response {
    /// The generated text, trimmed of surrounding whitespace.
    pub fn text(&self) -> &str {
        self.content.trim()
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

/// Token usage information.
#[derive(Debug, Clone, Default)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Chat::new("test-key");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.base_url, API_BASE);
    }

    #[test]
    fn test_client_with_model_and_base_url() {
        let client = Chat::new("test-key")
            .with_model("gpt-4o")
            .with_base_url("http://localhost:1234/v1/");
        assert_eq!(client.model(), "gpt-4o");
        assert_eq!(client.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Message::user("Hello")])
            .with_system("You are a chronicler")
            .with_max_tokens(1000)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, Some(1000));
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_api_request_puts_system_first() {
        let client = Chat::new("test-key");
        let request = Request::new(vec![Message::user("Hello"), Message::assistant("Hi")])
            .with_system("Be brief");

        let api = client.build_api_request(&request);
        let roles: Vec<_> = api.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
        assert_eq!(api.model, DEFAULT_MODEL);

        let json = serde_json::to_value(&api).unwrap();
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_response() {
        let raw = r#"{
            "id": "chatcmpl-1",
            "model": "gpt-4.1-mini",
            "choices": [{"message": {"role": "assistant", "content": "  The party rode on.  "}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
        }"#;
        let api: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = Chat::new("k").parse_response(api).unwrap();

        assert_eq!(response.text(), "The party rode on.");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.prompt_tokens, 12);
    }

    #[test]
    fn test_parse_response_without_choices() {
        let api: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = Chat::new("k").parse_response(api).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::Network("reset".into()).is_transient());
        assert!(Error::Api { status: 429, message: String::new() }.is_transient());
        assert!(Error::Api { status: 503, message: String::new() }.is_transient());
        assert!(!Error::Api { status: 401, message: String::new() }.is_transient());
        assert!(!Error::NoApiKey.is_transient());
    }

    #[test]
    fn test_empty_key_rejected() {
        let client = Chat::new("");
        assert!(matches!(client.build_headers(), Err(Error::NoApiKey)));
    }
}
