//! unit-forge: landing-page generation for unit-conversion pairs.
//!
//! Each conversion pair becomes one page whose sections are generated by a
//! chat-completions model, checked against per-section word windows, and
//! regenerated one section at a time until they comply or run out of passes.
//! The landing page that parents the conversion pages goes through the same
//! steps with its own section table.

pub mod cli;
pub mod error;
pub mod generation;
pub mod landing;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod sections;
pub mod storage;
pub mod units;
pub mod utils;

// Re-export commonly used error types
pub use error::{GenerationError, LlmError, RenderError, StoreError, TaskSourceError};
