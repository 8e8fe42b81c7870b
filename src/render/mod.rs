//! Human-readable HTML previews of generated pages.
//!
//! Previews are written whatever happens to persistence so reviewers can read
//! every document, including ones withheld from the store.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Tera};

use crate::error::RenderError;
use crate::landing::LandingDocument;
use crate::pipeline::{PageDocument, SectionResult, SeoBlock};
use crate::prompts::format_factor;
use crate::sections::SectionKey;

const STYLE: &str = r#"body { font-family: system-ui, sans-serif; max-width: 860px; margin: 2rem auto; line-height: 1.55; }
.meta { font-size: 0.85rem; background: #f4f4f4; padding: 0.75rem 1rem; border-radius: 6px; }
.meta code { background: #e8e8e8; padding: 0 0.25rem; }
.review { color: #a40000; font-weight: 600; }
.status { font-size: 0.8rem; color: #555; }
.highlight { display: inline-block; width: 45%; vertical-align: top; margin: 0 1rem 1rem 0; }
section { border-top: 1px solid #ddd; margin-top: 1.5rem; padding-top: 0.5rem; }"#;

const PREVIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ locale }}">
<head>
<meta charset="utf-8">
<title>{{ seo.meta_title }}</title>
<meta name="description" content="{{ seo.meta_description }}">
<link rel="canonical" href="{{ seo.canonical_url }}">
<style>
{{ style | safe }}
</style>
</head>
<body>
<div class="meta">
  <div>slug: <code>{{ slug }}</code> &middot; path: <code>{{ url_path }}</code></div>
  <div>{{ from_label }} ({{ from_code }}, {{ from_region }}) &rarr; {{ to_label }} ({{ to_code }}, {{ to_region }}) &middot; 1 {{ from_label }} &asymp; {{ factor }} {{ to_label }}</div>
  <div>city: {{ city }} &middot; locale: {{ locale }} &middot; site: {{ site_code }} &middot; status: {{ status }}</div>
  {% if needs_review %}<div class="review">Needs review: {{ review_summary }}</div>{% endif %}
</div>
<h1>{{ seo.h1_heading }}</h1>
{% for section in sections %}
SECTION_BLOCK
{% endfor %}
</body>
</html>
"#;

const LANDING_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ locale }}">
<head>
<meta charset="utf-8">
<title>{{ seo.meta_title }}</title>
<meta name="description" content="{{ seo.meta_description }}">
<link rel="canonical" href="{{ seo.canonical_url }}">
<style>
{{ style | safe }}
</style>
</head>
<body>
<div class="meta">
  <div>slug: <code>{{ slug }}</code> &middot; path: <code>{{ url_path }}</code> &middot; landing page</div>
  <div>country: {{ country }} &middot; use cases: {{ use_cases }}</div>
  <div>units: {{ units }}</div>
  <div>locale: {{ locale }} &middot; site: {{ site_code }} &middot; status: {{ status }}</div>
  {% if needs_review %}<div class="review">Needs review: {{ review_summary }}</div>{% endif %}
</div>
<h1>{{ seo.h1_heading }}</h1>
{% for section in sections %}
SECTION_BLOCK
{% endfor %}
</body>
</html>
"#;

const SECTION_BLOCK: &str = r#"<section id="{{ section.key }}">
  <h2>{{ section.heading }}</h2>
  <p class="status">{{ section.key }} &middot; {{ section.word_count }} words &middot; {{ section.status }} &middot; {{ section.passes_used }} pass(es)</p>
  {% if section.faqs %}
  {% for faq in section.faqs %}
  <details open>
    <summary>{{ faq.question }}</summary>
    {{ faq.answer_html | safe }}
  </details>
  {% endfor %}
  {% elif section.highlights %}
  {% for block in section.highlights %}
  <div class="highlight"><h3>{{ block.heading }}</h3><p>{{ block.subheading }}</p></div>
  {% endfor %}
  {% else %}
  {{ section.html | safe }}
  {% endif %}
</section>"#;

fn with_section_block(template: &str) -> String {
    template.replace("SECTION_BLOCK", SECTION_BLOCK)
}

#[derive(Serialize)]
struct PreviewFaq<'a> {
    question: &'a str,
    answer_html: &'a str,
}

#[derive(Serialize)]
struct PreviewHighlight<'a> {
    heading: &'a str,
    subheading: &'a str,
}

#[derive(Serialize)]
struct PreviewSection<'a> {
    key: &'a str,
    heading: String,
    word_count: usize,
    status: String,
    passes_used: usize,
    html: &'a str,
    faqs: Vec<PreviewFaq<'a>>,
    highlights: Vec<PreviewHighlight<'a>>,
}

impl<'a> PreviewSection<'a> {
    fn new(result: &'a SectionResult, heading: String) -> Self {
        Self {
            key: result.key.as_str(),
            heading,
            word_count: result.word_count,
            status: result.status.to_string(),
            passes_used: result.passes_used,
            html: result.body.html().unwrap_or_default(),
            faqs: result
                .body
                .faqs()
                .iter()
                .map(|f| PreviewFaq {
                    question: &f.question,
                    answer_html: &f.answer_html,
                })
                .collect(),
            highlights: result
                .body
                .highlights()
                .iter()
                .map(|b| PreviewHighlight {
                    heading: &b.heading,
                    subheading: &b.subheading,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct PreviewContext<'a> {
    style: &'static str,
    slug: &'a str,
    url_path: &'a str,
    locale: &'a str,
    site_code: &'a str,
    status: &'a str,
    needs_review: bool,
    review_summary: String,
    from_code: &'a str,
    to_code: &'a str,
    from_label: &'a str,
    to_label: &'a str,
    from_region: &'a str,
    to_region: &'a str,
    factor: String,
    city: &'a str,
    seo: &'a SeoBlock,
    sections: Vec<PreviewSection<'a>>,
}

#[derive(Serialize)]
struct LandingPreviewContext<'a> {
    style: &'static str,
    slug: &'a str,
    url_path: &'a str,
    locale: &'a str,
    site_code: &'a str,
    status: &'a str,
    needs_review: bool,
    review_summary: String,
    country: &'a str,
    use_cases: String,
    units: String,
    seo: &'a SeoBlock,
    sections: Vec<PreviewSection<'a>>,
}

/// Heading of a section; `from` and `to` are the pair labels and are
/// ignored for landing sections.
fn section_heading(key: SectionKey, from: &str, to: &str) -> String {
    match key {
        SectionKey::WhyConvert => format!("Why convert {} to {}?", from, to),
        SectionKey::FromUnit => format!("What is {}?", from),
        SectionKey::ToUnit => format!("What is {}?", to),
        SectionKey::Examples => "Examples".to_string(),
        SectionKey::Technical => "Technical details".to_string(),
        SectionKey::FaqBlock | SectionKey::LandingFaqs => "Frequently asked questions".to_string(),
        SectionKey::Description => "About Our Area Converter Tool".to_string(),
        SectionKey::Highlights => "Highlights".to_string(),
        SectionKey::MajorUnits => "Major area units".to_string(),
        SectionKey::Formulas => "Common Area Conversion Formulas".to_string(),
    }
}

/// Render a document as a standalone HTML page.
///
/// Labels and metadata are escaped; section HTML is emitted as generated.
pub fn render_document(doc: &PageDocument) -> Result<Vec<u8>, RenderError> {
    let (from, to) = (doc.task.from_label(), doc.task.to_label());
    let sections = doc
        .sections
        .values()
        .map(|s| PreviewSection::new(s, section_heading(s.key, from, to)))
        .collect();

    let ctx = PreviewContext {
        style: STYLE,
        slug: &doc.routing_slug,
        url_path: &doc.url_path,
        locale: &doc.metadata.locale,
        site_code: &doc.metadata.site_code,
        status: &doc.metadata.status,
        needs_review: doc.metadata.needs_review,
        review_summary: doc.review_summary(),
        from_code: doc.task.from_code(),
        to_code: doc.task.to_code(),
        from_label: doc.task.from_label(),
        to_label: doc.task.to_label(),
        from_region: doc.task.from_region(),
        to_region: doc.task.to_region(),
        factor: format_factor(doc.task.factor()),
        city: doc.task.city_hint().unwrap_or("-"),
        seo: &doc.seo,
        sections,
    };

    let context = Context::from_serialize(&ctx)?;
    let html = Tera::one_off(&with_section_block(PREVIEW_TEMPLATE), &context, true)?;
    Ok(html.into_bytes())
}

/// Render the landing document as a standalone HTML page.
pub fn render_landing(doc: &LandingDocument) -> Result<Vec<u8>, RenderError> {
    let sections = doc
        .sections
        .values()
        .map(|s| PreviewSection::new(s, section_heading(s.key, "", "")))
        .collect();
    let units = if doc.brief.featured_units.is_empty() {
        "-".to_string()
    } else {
        doc.brief.featured_units.join(", ")
    };

    let ctx = LandingPreviewContext {
        style: STYLE,
        slug: &doc.slug,
        url_path: &doc.url_path,
        locale: &doc.metadata.locale,
        site_code: &doc.metadata.site_code,
        status: &doc.metadata.status,
        needs_review: doc.metadata.needs_review,
        review_summary: doc.review_summary(),
        country: &doc.brief.target_country,
        use_cases: doc.brief.primary_use_cases.join(", "),
        units,
        seo: &doc.seo,
        sections,
    };

    let context = Context::from_serialize(&ctx)?;
    let html = Tera::one_off(&with_section_block(LANDING_TEMPLATE), &context, true)?;
    Ok(html.into_bytes())
}

/// Writes `<dir>/<slug>.html` previews.
#[derive(Debug, Clone)]
pub struct PreviewWriter {
    dir: PathBuf,
}

impl PreviewWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the preview for `slug` is written to.
    pub fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.html", slug))
    }

    /// Render and write one preview, creating the directory if needed.
    pub fn write(&self, doc: &PageDocument) -> Result<PathBuf, RenderError> {
        self.write_bytes(&doc.routing_slug, render_document(doc)?)
    }

    /// Render and write the landing preview.
    pub fn write_landing(&self, doc: &LandingDocument) -> Result<PathBuf, RenderError> {
        self.write_bytes(&doc.slug, render_landing(doc)?)
    }

    fn write_bytes(&self, slug: &str, bytes: Vec<u8>) -> Result<PathBuf, RenderError> {
        let path = self.path_for(slug);

        fs::create_dir_all(&self.dir).map_err(|e| RenderError::Write {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&path, bytes).map_err(|e| RenderError::Write {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(slug = %slug, path = %path.display(), "Preview written");
        Ok(path)
    }
}
