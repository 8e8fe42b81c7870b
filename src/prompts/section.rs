//! Prompt builder for single-section generation.
//!
//! Every section of a page is generated on its own, so a prompt carries the
//! whole page context (pair, regions, city, direction) plus the instruction
//! and word window for the one section being asked for.

use serde::Serialize;
use tera::{Context, Tera};

use crate::sections::{SectionKey, SectionPolicy, SectionShape};
use crate::units::{ConversionPairTask, PAN_INDIA};

/// Fallback city used when neither the input nor the labels name one.
pub const DEFAULT_CITY_PHRASE: &str = "a major Indian city";

/// System and user messages for one section request.
#[derive(Debug, Clone)]
pub struct SectionPrompt {
    /// System prompt with the house style.
    pub system: String,
    /// User prompt with the pair context and section instruction.
    pub user: String,
}

impl SectionPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// House style shared by every section request.
pub const SECTION_SYSTEM_PROMPT: &str = r#"You are a senior real-estate content writer for an Indian property portal.

You write sections of unit-conversion pages (for example Square Meter to Square Feet,
or Bigha in Assam to Acre). Readers are home buyers, land owners, brokers and
students who want a quick, correct answer and enough context to trust it.

## STYLE

- Plain, confident English as used in India; no hype, no filler.
- Output HTML fragments only: <p>, <ul>, <ol>, <li>, <strong>, <em>, <table>.
  Never emit <html>, <body>, <h1> or inline styles.
- Use the conversion factor you are given. Do not invent a different one.
- Respect regional variation: when a unit differs by state, say so and name the
  region you were given.
- Keep the page directional: it converts FROM one unit TO another, never the reverse.

## OUTPUT

Return ONLY a JSON object with the single key you are told to use.
Do NOT wrap the JSON in backticks and do not add commentary."#;

const SECTION_USER_TEMPLATE: &str = r#"Regenerate ONLY the section '{{ section }}' for a page that converts FROM {{ from_label }} TO {{ to_label }}.
Do not change the direction and do not generate the full page.

{{ direction_note }}

Use the following context:
- FROM unit code: {{ from_code }}
- FROM unit label: {{ from_label }}
- FROM unit region: {{ from_region }}
- TO unit code: {{ to_code }}
- TO unit label: {{ to_label }}
- TO unit region: {{ to_region }}
- Approximate factor (1 FROM ≈ X TO): {{ factor }}
- Primary city context: {{ city }}

{{ instruction }}

Output format:
Return a single JSON object with the key "{{ output_field }}"{% if is_collection %} whose value is an array of objects with "question" and "answer_html"{% else %} whose value is the section HTML{% endif %}."#;

#[derive(Serialize)]
struct SectionPromptContext<'a> {
    section: &'a str,
    from_code: &'a str,
    to_code: &'a str,
    from_label: &'a str,
    to_label: &'a str,
    from_region: &'a str,
    to_region: &'a str,
    factor: String,
    city: &'a str,
    direction_note: String,
    instruction: String,
    output_field: &'a str,
    is_collection: bool,
}

/// Per-section instruction with the policy's word window filled in.
pub fn section_instruction(policy: &SectionPolicy) -> String {
    let (min, max) = (policy.min_words, policy.max_words);
    match (policy.key, policy.shape) {
        (SectionKey::WhyConvert, _) => format!(
            "Write the WHY CONVERT section html, {}–{} words, explaining when and why people \
             convert in this direction.",
            min, max
        ),
        (SectionKey::FromUnit, _) => format!(
            "Write the FROM UNIT section html ('What is the FROM unit'), {}–{} words, with \
             history and usage domains.",
            min, max
        ),
        (SectionKey::ToUnit, _) => format!(
            "Write the TO UNIT section html ('What is the TO unit'), {}–{} words, with history \
             and usage domains.",
            min, max
        ),
        (SectionKey::Examples, _) => format!(
            "Write the EXAMPLES section html, {}–{} words, with 3–5 practical conversions.",
            min, max
        ),
        (SectionKey::Technical, _) => format!(
            "Write the TECHNICAL DETAILS section html, {}–{} words, with the formula and a \
             clear note on precision and rounding.",
            min, max
        ),
        (SectionKey::FaqBlock, SectionShape::Collection { min_items, max_items }) => format!(
            "Write the entire FAQ block as an array of {}–{} FAQs (question + answer_html), \
             each answer {}–{} words.",
            min_items, max_items, min, max
        ),
        (SectionKey::FaqBlock, SectionShape::Prose) => format!(
            "Write the FAQ block as html, {}–{} words in total.",
            min, max
        ),
        (SectionKey::Description, _) => format!(
            "Write the DESCRIPTION section html, {}–{} words, introducing the area converter \
             and who relies on it.",
            min, max
        ),
        (SectionKey::Highlights, SectionShape::Collection { min_items, max_items }) => format!(
            "Write {}–{} HIGHLIGHT blocks (heading + subheading): a heading of 2–5 words and a \
             subheading of {}–{} words each.",
            min_items, max_items, min, max
        ),
        (SectionKey::Highlights, SectionShape::Prose) => format!(
            "Write the HIGHLIGHTS as html, {}–{} words in total.",
            min, max
        ),
        (SectionKey::MajorUnits, _) => format!(
            "Write the MAJOR UNITS section html, {}–{} words, covering the standard units and \
             the regional land units people meet most often.",
            min, max
        ),
        (SectionKey::Formulas, _) => format!(
            "Write the FORMULAS section html, {}–{} words, introducing the most common area \
             conversion formulas.",
            min, max
        ),
        (SectionKey::LandingFaqs, SectionShape::Collection { min_items, max_items }) => format!(
            "Write the entire FAQ block as an array of {}–{} FAQs (question + answer_html) about \
             using the converter, each answer {}–{} words.",
            min_items, max_items, min, max
        ),
        (SectionKey::LandingFaqs, SectionShape::Prose) => format!(
            "Write the FAQ block as html, {}–{} words in total.",
            min, max
        ),
    }
}

/// Build the prompt for one section of one pair.
pub fn build_section_prompt(
    task: &ConversionPairTask,
    policy: &SectionPolicy,
) -> Result<SectionPrompt, tera::Error> {
    let ctx = SectionPromptContext {
        section: policy.key.as_str(),
        from_code: task.from_code(),
        to_code: task.to_code(),
        from_label: task.from_label(),
        to_label: task.to_label(),
        from_region: non_empty_or(task.from_region(), PAN_INDIA),
        to_region: non_empty_or(task.to_region(), PAN_INDIA),
        factor: format_factor(task.factor()),
        city: task.city_hint().unwrap_or(DEFAULT_CITY_PHRASE),
        direction_note: task.direction_note(),
        instruction: section_instruction(policy),
        output_field: policy.key.output_field(),
        is_collection: matches!(policy.shape, SectionShape::Collection { .. }),
    };

    let context = Context::from_serialize(&ctx)?;
    let user = Tera::one_off(SECTION_USER_TEMPLATE, &context, false)?;

    Ok(SectionPrompt::new(SECTION_SYSTEM_PROMPT, user))
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Significant digits kept when printing a factor.
const FACTOR_DIGITS: usize = 10;

/// Render a factor without float noise, e.g. `10.7639` rather than
/// `10.763900000000001`.
///
/// Rounds to significant digits, not decimal places, so tiny factors such as
/// `6.4516e-8` keep their value.
pub fn format_factor(factor: f64) -> String {
    if !factor.is_finite() {
        return "N/A".to_string();
    }
    let rounded = format!("{:.*e}", FACTOR_DIGITS - 1, factor)
        .parse::<f64>()
        .unwrap_or(factor);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::default_policy;

    fn task() -> ConversionPairTask {
        ConversionPairTask::new(
            "BIGHA_ASSAM",
            "ACRE",
            "Bigha – Assam",
            "Acre",
            0.330579,
            "Assam",
            "Pan-India",
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_prompt_carries_context() {
        let prompt = build_section_prompt(&task(), &default_policy(SectionKey::WhyConvert)).unwrap();
        assert!(prompt.system.contains("JSON object"));
        assert!(prompt.user.contains("FROM unit code: BIGHA_ASSAM"));
        assert!(prompt.user.contains("FROM unit region: Assam"));
        assert!(prompt.user.contains("TO unit region: Pan-India"));
        assert!(prompt.user.contains("1 FROM ≈ X TO): 0.330579"));
        assert!(prompt.user.contains("Primary city context: a major Indian city"));
        assert!(prompt.user.contains("220–260 words"));
        assert!(prompt.user.contains("\"why_convert_section_html\""));
        assert!(prompt.user.contains("FROM Bigha – Assam TO Acre"));
    }

    #[test]
    fn test_faq_prompt_asks_for_array() {
        let prompt = build_section_prompt(&task(), &default_policy(SectionKey::FaqBlock)).unwrap();
        assert!(prompt.user.contains("array of 4–5 FAQs"));
        assert!(prompt.user.contains("\"faqs\" whose value is an array"));
    }

    #[test]
    fn test_custom_window_reaches_instruction() {
        let policy = SectionPolicy::prose(SectionKey::WhyConvert, 200, 300);
        assert!(section_instruction(&policy).contains("200–300 words"));
    }

    #[test]
    fn test_format_factor() {
        assert_eq!(format_factor(10.7639), "10.7639");
        assert_eq!(format_factor(1.0), "1");
        assert_eq!(format_factor(0.092903), "0.092903");
        assert_eq!(format_factor(f64::NAN), "N/A");
        assert_eq!(format_factor(14400.0), "14400");
        assert_eq!(format_factor(10.763900000000001), "10.7639");
        assert_eq!(format_factor(4046.8564224), "4046.856422");
    }

    #[test]
    fn test_format_factor_keeps_tiny_factors() {
        assert_eq!(format_factor(6.4516e-8), "0.000000064516");
        assert_eq!(format_factor(0.0000004), "0.0000004");
        assert_ne!(format_factor(1e-12), "0");
    }

    #[test]
    fn test_prompt_quotes_tiny_factor() {
        let task = ConversionPairTask::new(
            "SQ_IN",
            "HECTARE",
            "Square Inch",
            "Hectare",
            6.4516e-8,
            "Pan-India",
            "Pan-India",
            None,
        )
        .unwrap();
        let prompt = build_section_prompt(&task, &default_policy(SectionKey::WhyConvert)).unwrap();
        assert!(prompt.user.contains("1 FROM ≈ X TO): 0.000000064516"));
    }
}
