//! Section generation capability.
//!
//! The orchestrator only sees [`SectionGenerator`]: a call either yields a
//! section body or a classified [`GenerationError`]. [`LlmSectionGenerator`]
//! is the production implementation; tests substitute scripted generators.
//!
//! Generators are parameterised over the page they write for. Conversion
//! pages ([`ConversionPairTask`]) are the default subject; the landing page
//! uses [`crate::landing::LandingBrief`].

pub mod llm_section;
pub mod retry;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::sections::{SectionBody, SectionKey};
use crate::units::ConversionPairTask;

pub use llm_section::{parse_section_response, LlmSectionGenerator};
pub use retry::{generate_with_backoff, RetryPolicy};

/// A page that sections are generated for.
pub trait PageSubject: Send + Sync + 'static {
    /// Short identifier used in logs and reports.
    fn label(&self) -> String;
}

impl PageSubject for ConversionPairTask {
    fn label(&self) -> String {
        self.identity().to_string()
    }
}

/// Produces the content of one section of one page.
#[async_trait]
pub trait SectionGenerator<S: PageSubject = ConversionPairTask>: Send + Sync {
    async fn generate(&self, subject: &S, key: SectionKey) -> Result<SectionBody, GenerationError>;
}
