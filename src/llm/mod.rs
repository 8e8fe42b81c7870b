//! LLM integration for unit-forge.
//!
//! Section text is produced through the [`LlmProvider`] trait; the bundled
//! [`LiteLlmClient`] speaks the OpenAI-compatible chat-completions protocol.
//!
//! ```ignore
//! use unit_forge::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::from_env()?;
//! let request = GenerationRequest::new("", vec![Message::user("Hello")]);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Role, Usage,
    DEFAULT_API_BASE, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
