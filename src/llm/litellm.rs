//! OpenAI-compatible chat-completions client.
//!
//! LiteLLM proxies, OpenRouter and the OpenAI API all accept the same
//! `/chat/completions` body, so one client covers every backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default API base when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model for section generation.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default sampling temperature for section generation.
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// One chat message, as sent and as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    /// Text content; a `null` from the API reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Set by the API when the model declines to answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            refusal: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Chat-completions request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier; empty means "use the client's default".
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat-completions response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

impl GenerationResponse {
    /// Content of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }

    fn refusal(&self) -> Option<&str> {
        self.choices.iter().find_map(|c| c.message.refusal.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: Message,
    /// `stop`, `length`, ...
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Anything that can answer a chat-completions request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a non-success HTTP response to an [`LlmError`].
fn classify_failure(status: StatusCode, body: String) -> LlmError {
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(message)
    } else {
        LlmError::ApiError {
            code: status.as_u16(),
            message,
        }
    }
}

/// Client for OpenAI-compatible chat-completions APIs.
pub struct LiteLlmClient {
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    timeout: Duration,
    http: Client,
}

impl LiteLlmClient {
    /// * `api_base` - Base URL of the API (e.g., "http://localhost:4000")
    /// * `api_key` - Optional bearer token
    /// * `default_model` - Model used when a request leaves `model` empty
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            timeout: DEFAULT_TIMEOUT,
            http: Self::http_client(DEFAULT_TIMEOUT),
        }
    }

    /// Client configured from `LITELLM_API_BASE`, `OPENAI_API_KEY` (or
    /// `LITELLM_API_KEY`) and `LITELLM_DEFAULT_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if neither key variable is set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = env::var("OPENAI_API_KEY")
            .or_else(|_| env::var("LITELLM_API_KEY"))
            .map_err(|_| LlmError::MissingApiKey)?;
        Ok(Self::new(
            env::var("LITELLM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            Some(api_key),
            env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        ))
    }

    /// Replace the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.http = Self::http_client(timeout);
        self
    }

    fn http_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, mut request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        if request.model.is_empty() {
            request.model = self.default_model.clone();
        }

        let mut builder = self
            .http
            .post(self.endpoint())
            .header("X-Title", "unit-forge")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(classify_failure(status, body));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        if let Some(refusal) = parsed.refusal() {
            return Err(LlmError::Refused(refusal.to_string()));
        }
        tracing::trace!(model = %parsed.model, tokens = parsed.usage.total_tokens, "Completion received");
        Ok(parsed)
    }
}
