//! Section generator backed by a chat-completions model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::GenerationError;
use crate::landing::LandingBrief;
use crate::llm::{GenerationRequest, LlmProvider, Message, DEFAULT_TEMPERATURE};
use crate::prompts::{build_landing_prompt, build_section_prompt, SectionPrompt};
use crate::sections::{
    default_policy, FaqEntry, HighlightBlock, SectionBody, SectionKey, SectionPolicy, SectionShape,
};
use crate::units::ConversionPairTask;
use crate::utils::try_extract_json_object;

use super::{PageSubject, SectionGenerator};

const DEFAULT_MAX_TOKENS: u32 = 3000;

/// Generates one section per call by prompting an [`LlmProvider`].
pub struct LlmSectionGenerator {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    policies: Vec<SectionPolicy>,
}

impl LlmSectionGenerator {
    /// Create a generator using the provider's default model and the default policies.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            policies: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Word windows quoted in prompts; sections not listed use the defaults.
    pub fn with_policies(mut self, policies: Vec<SectionPolicy>) -> Self {
        self.policies = policies;
        self
    }

    fn policy_for(&self, key: SectionKey) -> SectionPolicy {
        self.policies
            .iter()
            .copied()
            .find(|p| p.key == key)
            .unwrap_or_else(|| default_policy(key))
    }

    async fn complete(
        &self,
        subject: &dyn PageSubject,
        policy: &SectionPolicy,
        prompt: SectionPrompt,
    ) -> Result<SectionBody, GenerationError> {
        let key = policy.key;
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(prompt.system), Message::user(prompt.user)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens);

        let response = self.provider.generate(request).await?;
        let content = response
            .first_content()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| GenerationError::Unavailable("model returned no content".to_string()))?;

        tracing::debug!(
            page = %subject.label(),
            section = %key,
            response_chars = content.len(),
            "Received section response"
        );

        parse_section_response(content, key, policy.shape)
    }
}

#[async_trait]
impl SectionGenerator for LlmSectionGenerator {
    async fn generate(
        &self,
        task: &ConversionPairTask,
        key: SectionKey,
    ) -> Result<SectionBody, GenerationError> {
        let policy = self.policy_for(key);
        let prompt = build_section_prompt(task, &policy).map_err(prompt_failure)?;
        self.complete(task, &policy, prompt).await
    }
}

#[async_trait]
impl SectionGenerator<LandingBrief> for LlmSectionGenerator {
    async fn generate(
        &self,
        brief: &LandingBrief,
        key: SectionKey,
    ) -> Result<SectionBody, GenerationError> {
        let policy = self.policy_for(key);
        let prompt = build_landing_prompt(brief, &policy).map_err(prompt_failure)?;
        self.complete(brief, &policy, prompt).await
    }
}

fn prompt_failure(err: tera::Error) -> GenerationError {
    GenerationError::Rejected(format!("prompt rendering failed: {}", err))
}

#[derive(Debug, Deserialize)]
struct RawFaq {
    question: String,
    #[serde(alias = "answerHtml", alias = "answer")]
    answer_html: String,
}

#[derive(Debug, Deserialize)]
struct RawHighlight {
    #[serde(alias = "title")]
    heading: String,
    #[serde(alias = "subHeading", alias = "description")]
    subheading: String,
}

/// Parse a model response into a section body.
///
/// The response must hold a JSON object keyed by the section's output field;
/// a single-key object under another name is accepted too. Anything
/// unparseable is `Unavailable` since a fresh sample may well succeed.
pub fn parse_section_response(
    content: &str,
    key: SectionKey,
    shape: SectionShape,
) -> Result<SectionBody, GenerationError> {
    let json = try_extract_json_object(content)
        .map_err(|e| GenerationError::Unavailable(format!("{} response: {}", key, e)))?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| GenerationError::Unavailable(format!("{} response: {}", key, e)))?;

    let field = key.output_field();
    let payload = match value {
        Value::Object(mut map) => match map.remove(field) {
            Some(v) => v,
            None if map.len() == 1 => map
                .into_iter()
                .next()
                .map(|(_, v)| v)
                .unwrap_or(Value::Null),
            None => {
                return Err(GenerationError::Unavailable(format!(
                    "{} response has no '{}' key",
                    key, field
                )))
            }
        },
        _ => {
            return Err(GenerationError::Unavailable(format!(
                "{} response is not a JSON object",
                key
            )))
        }
    };

    match shape {
        SectionShape::Prose => match payload {
            Value::String(html) => Ok(SectionBody::Prose(html)),
            other => Err(GenerationError::Unavailable(format!(
                "{} response: expected a string for '{}', got {}",
                key,
                field,
                json_kind(&other)
            ))),
        },
        SectionShape::Collection { .. } if key == SectionKey::Highlights => {
            let raw: Vec<RawHighlight> = serde_json::from_value(payload).map_err(|e| {
                GenerationError::Unavailable(format!("{} response: {}", key, e))
            })?;
            Ok(SectionBody::Highlights(
                raw.into_iter()
                    .map(|h| HighlightBlock {
                        heading: h.heading,
                        subheading: h.subheading,
                    })
                    .collect(),
            ))
        }
        SectionShape::Collection { .. } => {
            let raw: Vec<RawFaq> = serde_json::from_value(payload).map_err(|e| {
                GenerationError::Unavailable(format!("{} response: {}", key, e))
            })?;
            Ok(SectionBody::Faqs(
                raw.into_iter()
                    .map(|f| FaqEntry {
                        question: f.question,
                        answer_html: f.answer_html,
                    })
                    .collect(),
            ))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use std::sync::Mutex;

    struct MockLlmProvider {
        response: Mutex<Result<String, u16>>,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl MockLlmProvider {
        fn new(response: impl Into<String>) -> Self {
            Self {
                response: Mutex::new(Ok(response.into())),
                last_request: Mutex::new(None),
            }
        }

        fn failing(code: u16) -> Self {
            Self {
                response: Mutex::new(Err(code)),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            *self.last_request.lock().expect("lock not poisoned") = Some(request);
            let content = match &*self.response.lock().expect("lock not poisoned") {
                Ok(content) => content.clone(),
                Err(code) => {
                    return Err(LlmError::ApiError {
                        code: *code,
                        message: "mock failure".to_string(),
                    })
                }
            };
            Ok(GenerationResponse {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: Usage {
                    prompt_tokens: 100,
                    completion_tokens: 50,
                    total_tokens: 150,
                },
            })
        }
    }

    fn task() -> ConversionPairTask {
        ConversionPairTask::new(
            "SQ_M",
            "SQ_FT",
            "Square Meter",
            "Square Feet",
            10.7639,
            "Pan-India",
            "Pan-India",
            Some("Mumbai".to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generates_prose_section() {
        let provider = Arc::new(MockLlmProvider::new(
            r#"{"why_convert_section_html": "<p>Builders quote in square feet.</p>"}"#,
        ));
        let generator = LlmSectionGenerator::new(provider.clone()).with_model("test-model");

        let body = generator
            .generate(&task(), SectionKey::WhyConvert)
            .await
            .unwrap();
        assert_eq!(
            body,
            SectionBody::Prose("<p>Builders quote in square feet.</p>".to_string())
        );

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "test-model");
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[1].content.contains("Primary city context: Mumbai"));
    }

    #[tokio::test]
    async fn test_generates_faq_section_from_fenced_json() {
        let provider = Arc::new(MockLlmProvider::new(
            "```json\n{\"faqs\": [{\"question\": \"Q1?\", \"answer_html\": \"<p>A1</p>\"}, \
             {\"question\": \"Q2?\", \"answerHtml\": \"<p>A2</p>\"}]}\n```",
        ));
        let generator = LlmSectionGenerator::new(provider);

        let body = generator.generate(&task(), SectionKey::FaqBlock).await.unwrap();
        let faqs = body.faqs();
        assert_eq!(faqs.len(), 2);
        assert_eq!(faqs[1].answer_html, "<p>A2</p>");
    }

    #[tokio::test]
    async fn test_generates_landing_highlights() {
        let provider = Arc::new(MockLlmProvider::new(
            r#"{"highlight_blocks": [{"heading": "Accurate", "subheading": "Standard factors for every unit"},
                {"title": "Regional", "subHeading": "Bigha, Gunta and Cent by state"}]}"#,
        ));
        let generator = LlmSectionGenerator::new(provider.clone());

        let body = generator
            .generate(&LandingBrief::default(), SectionKey::Highlights)
            .await
            .unwrap();
        let blocks = body.highlights();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].heading, "Regional");
        assert_eq!(blocks[1].subheading, "Bigha, Gunta and Cent by state");

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert!(request.messages[0].content.contains("landing page"));
        assert!(request.messages[1].content.contains("Target country: India"));
    }

    #[tokio::test]
    async fn test_landing_prose_uses_landing_window() {
        let provider = Arc::new(MockLlmProvider::new(
            r#"{"formulas_section_html": "<p>Multiply by 10.7639.</p>"}"#,
        ));
        let generator = LlmSectionGenerator::new(provider.clone())
            .with_policies(vec![SectionPolicy::prose(SectionKey::Formulas, 90, 110)]);

        let body = generator
            .generate(&LandingBrief::default(), SectionKey::Formulas)
            .await
            .unwrap();
        assert_eq!(body.html(), Some("<p>Multiply by 10.7639.</p>"));
        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert!(request.messages[1].content.contains("90–110 words"));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let generator = LlmSectionGenerator::new(Arc::new(MockLlmProvider::failing(503)));
        let err = generator
            .generate(&task(), SectionKey::Examples)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_client_error_is_rejected() {
        let generator = LlmSectionGenerator::new(Arc::new(MockLlmProvider::failing(400)));
        let err = generator
            .generate(&task(), SectionKey::Examples)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_empty_content_is_unavailable() {
        let generator = LlmSectionGenerator::new(Arc::new(MockLlmProvider::new("   ")));
        let err = generator
            .generate(&task(), SectionKey::Examples)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_accepts_single_differently_named_key() {
        let body = parse_section_response(
            r#"{"html": "<p>x</p>"}"#,
            SectionKey::Technical,
            SectionShape::Prose,
        )
        .unwrap();
        assert_eq!(body.html(), Some("<p>x</p>"));
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let err = parse_section_response(
            r#"{"technical_details_html": 42}"#,
            SectionKey::Technical,
            SectionShape::Prose,
        )
        .unwrap_err();
        assert!(err.to_string().contains("got a number"));

        let err = parse_section_response(
            r#"{"a": "x", "b": "y"}"#,
            SectionKey::Technical,
            SectionShape::Prose,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no 'technical_details_html' key"));
    }
}
