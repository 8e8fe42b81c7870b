//! Prompt builder for the landing page that parents every conversion page.
//!
//! Landing sections are requested one at a time like pair sections, but the
//! context is the site-level brief (country, use cases, units covered)
//! rather than a single pair.

use serde::Serialize;
use tera::{Context, Tera};

use crate::landing::LandingBrief;
use crate::sections::{SectionKey, SectionPolicy, SectionShape};

use super::section::{section_instruction, SectionPrompt};

/// Used when the brief lists no featured units.
pub const DEFAULT_UNITS_PHRASE: &str = "standard and regional Indian area units";

/// House style for landing-page sections.
pub const LANDING_SYSTEM_PROMPT: &str = r#"You are a senior real-estate content writer for an Indian property portal.

You write sections of the landing page of an online area converter. The page
introduces the tool, explains the units it covers and links out to individual
conversion pages. Readers are home buyers, land owners, brokers and students.

## STYLE

- Plain, confident English as used in India; no hype, no filler.
- Output HTML fragments only: <p>, <ul>, <ol>, <li>, <strong>, <em>, <table>.
  Never emit <html>, <body>, <h1> or inline styles.
- Do not quote conversion factors you are not sure of; prefer formulas in words.
- Mention regional land units by the states that use them.

## OUTPUT

Return ONLY a JSON object with the single key you are told to use.
Do NOT wrap the JSON in backticks and do not add commentary."#;

const LANDING_USER_TEMPLATE: &str = r#"Write ONLY the section '{{ section }}' of the "{{ title }}" landing page at /{{ slug }}.
Do not generate the full page.

Use the following context:
- Target country: {{ target_country }}
- Primary use cases: {{ use_cases }}
- Units covered: {{ units }}

{{ instruction }}

Output format:
Return a single JSON object with the key "{{ output_field }}" whose value is {{ value_shape }}."#;

#[derive(Serialize)]
struct LandingPromptContext<'a> {
    section: &'a str,
    title: &'a str,
    slug: &'a str,
    target_country: &'a str,
    use_cases: String,
    units: String,
    instruction: String,
    output_field: &'a str,
    value_shape: &'static str,
}

fn value_shape(policy: &SectionPolicy) -> &'static str {
    match (policy.shape, policy.key) {
        (SectionShape::Prose, _) => "the section HTML",
        (SectionShape::Collection { .. }, SectionKey::Highlights) => {
            r#"an array of objects with "heading" and "subheading""#
        }
        (SectionShape::Collection { .. }, _) => {
            r#"an array of objects with "question" and "answer_html""#
        }
    }
}

/// Build the prompt for one section of the landing page.
pub fn build_landing_prompt(
    brief: &LandingBrief,
    policy: &SectionPolicy,
) -> Result<SectionPrompt, tera::Error> {
    let units = if brief.featured_units.is_empty() {
        DEFAULT_UNITS_PHRASE.to_string()
    } else {
        brief.featured_units.join(", ")
    };

    let ctx = LandingPromptContext {
        section: policy.key.as_str(),
        title: &brief.title,
        slug: &brief.slug,
        target_country: &brief.target_country,
        use_cases: brief.primary_use_cases.join(", "),
        units,
        instruction: section_instruction(policy),
        output_field: policy.key.output_field(),
        value_shape: value_shape(policy),
    };

    let context = Context::from_serialize(&ctx)?;
    let user = Tera::one_off(LANDING_USER_TEMPLATE, &context, false)?;

    Ok(SectionPrompt::new(LANDING_SYSTEM_PROMPT, user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::default_policy;

    #[test]
    fn test_landing_prompt_carries_brief() {
        let brief = LandingBrief::default();
        let prompt = build_landing_prompt(&brief, &default_policy(SectionKey::Description)).unwrap();
        assert!(prompt.system.contains("landing page"));
        assert!(prompt.user.contains("landing page at /area-convertor"));
        assert!(prompt.user.contains("Target country: India"));
        assert!(prompt
            .user
            .contains("Primary use cases: real estate, construction, land measurement"));
        assert!(prompt.user.contains(DEFAULT_UNITS_PHRASE));
        assert!(prompt.user.contains("180–260 words"));
        assert!(prompt.user.contains("\"description_section_html\" whose value is the section HTML"));
    }

    #[test]
    fn test_highlight_prompt_asks_for_blocks() {
        let brief = LandingBrief::default()
            .with_featured_units(vec!["Acre".to_string(), "Bigha".to_string()]);
        let prompt = build_landing_prompt(&brief, &default_policy(SectionKey::Highlights)).unwrap();
        assert!(prompt.user.contains("Units covered: Acre, Bigha"));
        assert!(prompt.user.contains("3–6 HIGHLIGHT blocks"));
        assert!(prompt.user.contains(r#""heading" and "subheading""#));
    }

    #[test]
    fn test_landing_faq_prompt_asks_for_answers() {
        let prompt =
            build_landing_prompt(&LandingBrief::default(), &default_policy(SectionKey::LandingFaqs))
                .unwrap();
        assert!(prompt.user.contains("array of 5–8 FAQs"));
        assert!(prompt.user.contains("\"faqs\" whose value is an array"));
    }
}
