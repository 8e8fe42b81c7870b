//! Error types for unit-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Task input loading
//! - LLM API interactions
//! - Section generation
//! - Destination store access
//! - Preview rendering

use thiserror::Error;

/// Errors that abort loading a whole task input.
///
/// Row-level problems are not errors: they surface as
/// [`SourceRow::Malformed`](crate::units::SourceRow) and the load continues.
#[derive(Debug, Error)]
pub enum TaskSourceError {
    #[error("Input file '{path}' could not be opened: {reason}")]
    Open { path: String, reason: String },

    #[error("Input header is unusable: {0}")]
    Header(String),

    #[error("Input layout '{0}' is not recognised (expected auto, pairs or matrix)")]
    UnknownLayout(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENAI_API_KEY or LITELLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("Model refused the request: {0}")]
    Refused(String),
}

/// Classified failure of the section generation capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Transient failure; worth retrying with backoff.
    #[error("Generation unavailable: {0}")]
    Unavailable(String),

    /// Non-retryable failure, e.g. a policy refusal.
    #[error("Generation rejected: {0}")]
    Rejected(String),
}

impl GenerationError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Unavailable(_))
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        let retryable = match &err {
            LlmError::RequestFailed(_) | LlmError::RateLimited(_) | LlmError::ParseError(_) => {
                true
            }
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429 || *code == 408,
            LlmError::MissingApiKey | LlmError::Refused(_) => false,
        };

        if retryable {
            GenerationError::Unavailable(err.to_string())
        } else {
            GenerationError::Rejected(err.to_string())
        }
    }
}

/// Errors that can occur while talking to the destination store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Unsupported store URL '{0}': expected sqlite:// or postgres://")]
    UnsupportedUrl(String),

    #[error("No destination store configured: pass --store-url or use --preview-only")]
    NotConfigured,

    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while rendering or writing previews.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template rendering error: {0}")]
    Tera(#[from] tera::Error),

    #[error("Failed to write preview '{path}': {reason}")]
    Write { path: String, reason: String },
}
