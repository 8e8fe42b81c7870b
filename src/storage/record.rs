//! Field layout of stored pages.
//!
//! The store keeps one JSON document per slug in the shape the site reads
//! (camelCase keys): [`StoredPage`] for conversion pages and
//! [`StoredLanding`] for their parent landing page. Timestamps live in their
//! own columns and are set by the store, not here; the display date is
//! stamped by the sink at write time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::landing::{LandingDocument, LANDING_PAGE_TYPE};
use crate::pipeline::{PageDocument, SectionResults, SectionStatus, SeoBlock};
use crate::sections::{FaqEntry, SectionKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPage {
    pub parent_slug: String,
    pub slug: String,
    pub url_path: String,
    pub from_unit_code: String,
    pub to_unit_code: String,
    pub from_unit_label: String,
    pub to_unit_label: String,
    pub factor: f64,
    pub from_unit_region: String,
    pub to_unit_region: String,
    pub city_name: Option<String>,
    pub locale: String,
    pub site_code: String,
    pub status: String,
    pub version: u32,
    pub needs_review: bool,
    /// Date shown as "last updated" on the page.
    #[serde(default)]
    pub last_updated_display_date: Option<DateTime<Utc>>,
    pub seo: StoredSeo,
    /// Curated by editors; always written empty.
    #[serde(default)]
    pub popular_conversions: Vec<serde_json::Value>,
    pub why_convert_section: WhyConvertSection,
    pub standalone_sections: Vec<StandaloneSection>,
    pub examples_section: ExamplesSection,
    pub technical_details_section: TechnicalDetailsSection,
    pub faqs: Vec<StoredFaq>,
    pub section_report: Vec<SectionReportEntry>,
    pub page_settings: PageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSeo {
    pub meta_title: String,
    pub meta_description: String,
    pub h1_heading: String,
    pub canonical_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhyConvertSection {
    pub section_heading: String,
    pub explanation_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneSection {
    pub unit_code: String,
    pub section_heading: String,
    pub description_html: String,
    /// `fromUnit` or `toUnit`.
    pub section_key: String,
    pub sort_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamplesSection {
    pub content_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalDetailsSection {
    pub technical_explanation_html: String,
    pub conversion_table_rows: Vec<serde_json::Value>,
    pub precision_notes_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFaq {
    pub question: String,
    pub answer_html: String,
    pub is_active: bool,
    pub sort_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReportEntry {
    pub section_key: SectionKey,
    pub word_count: usize,
    pub status: SectionStatus,
    pub passes_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    pub no_index: bool,
    pub include_in_sitemap: bool,
    pub enable_schema_markup: bool,
    pub show_breadcrumbs: bool,
    pub page_priority: f64,
    pub change_frequency: String,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            no_index: false,
            include_in_sitemap: true,
            enable_schema_markup: true,
            show_breadcrumbs: true,
            page_priority: 0.7,
            change_frequency: "monthly".to_string(),
        }
    }
}

impl StoredPage {
    /// Set the "last updated" date shown on the page.
    pub fn displayed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated_display_date = Some(at);
        self
    }
}

/// A stored page together with its store-side timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub page: StoredPage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The landing page as the site reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLanding {
    pub slug: String,
    /// Always `landing`.
    pub page_type: String,
    pub url_path: String,
    pub locale: String,
    pub site_code: String,
    pub status: String,
    pub version: u32,
    pub needs_review: bool,
    #[serde(default)]
    pub last_updated_display_date: Option<DateTime<Utc>>,
    pub seo: StoredSeo,
    /// Curated by editors; always written empty.
    #[serde(default)]
    pub popular_conversions: Vec<serde_json::Value>,
    pub description_section: DescriptionSection,
    /// Filled from the unit master by editors; always written empty.
    #[serde(default)]
    pub major_units: Vec<serde_json::Value>,
    pub major_units_copy_html: String,
    pub formulas_section: FormulasSection,
    pub faqs: Vec<StoredFaq>,
    pub section_report: Vec<SectionReportEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionSection {
    pub section_heading: String,
    pub section_subheading: String,
    pub main_description_html: String,
    pub highlight_blocks: Vec<StoredHighlight>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredHighlight {
    /// `BLOCK_1`, `BLOCK_2`, ...
    pub block_key: String,
    pub is_visible: bool,
    pub heading: String,
    pub subheading: String,
    pub sort_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulasSection {
    pub show_formulas_section: bool,
    pub section_title: String,
    pub section_description: String,
    #[serde(default)]
    pub formula_examples: Vec<serde_json::Value>,
}

impl StoredLanding {
    /// Set the "last updated" date shown on the page.
    pub fn displayed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_updated_display_date = Some(at);
        self
    }
}

/// The stored landing page with its store-side timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct LandingRecord {
    pub landing: StoredLanding,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SeoBlock> for StoredSeo {
    fn from(seo: &SeoBlock) -> Self {
        Self {
            meta_title: seo.meta_title.clone(),
            meta_description: seo.meta_description.clone(),
            h1_heading: seo.h1_heading.clone(),
            canonical_url: seo.canonical_url.clone(),
        }
    }
}

fn prose_of(sections: &SectionResults, key: SectionKey) -> String {
    sections
        .get(&key)
        .and_then(|s| s.body.html())
        .unwrap_or_default()
        .to_string()
}

fn prose(doc: &PageDocument, key: SectionKey) -> String {
    prose_of(&doc.sections, key)
}

fn stored_faqs(faqs: &[FaqEntry]) -> Vec<StoredFaq> {
    faqs.iter()
        .enumerate()
        .map(|(i, faq)| StoredFaq {
            question: faq.question.clone(),
            answer_html: faq.answer_html.clone(),
            is_active: true,
            sort_order: i as u32 + 1,
        })
        .collect()
}

fn section_report(sections: &SectionResults) -> Vec<SectionReportEntry> {
    sections
        .values()
        .map(|s| SectionReportEntry {
            section_key: s.key,
            word_count: s.word_count,
            status: s.status,
            passes_used: s.passes_used,
        })
        .collect()
}

impl From<&LandingDocument> for StoredLanding {
    fn from(doc: &LandingDocument) -> Self {
        let highlight_blocks = doc
            .section(SectionKey::Highlights)
            .map(|s| s.body.highlights())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, block)| StoredHighlight {
                block_key: format!("BLOCK_{}", i + 1),
                is_visible: true,
                heading: block.heading.clone(),
                subheading: block.subheading.clone(),
                sort_order: i as u32 + 1,
            })
            .collect();

        Self {
            slug: doc.slug.clone(),
            page_type: LANDING_PAGE_TYPE.to_string(),
            url_path: doc.url_path.clone(),
            locale: doc.metadata.locale.clone(),
            site_code: doc.metadata.site_code.clone(),
            status: doc.metadata.status.clone(),
            version: doc.metadata.version,
            needs_review: doc.metadata.needs_review,
            last_updated_display_date: None,
            seo: StoredSeo::from(&doc.seo),
            popular_conversions: Vec::new(),
            description_section: DescriptionSection {
                section_heading: "About Our Area Converter Tool".to_string(),
                section_subheading: format!(
                    "Quick and accurate area conversions for {} real estate",
                    demonym(&doc.brief.target_country)
                ),
                main_description_html: prose_of(&doc.sections, SectionKey::Description),
                highlight_blocks,
            },
            major_units: Vec::new(),
            major_units_copy_html: prose_of(&doc.sections, SectionKey::MajorUnits),
            formulas_section: FormulasSection {
                show_formulas_section: true,
                section_title: "Common Area Conversion Formulas".to_string(),
                section_description: prose_of(&doc.sections, SectionKey::Formulas),
                formula_examples: Vec::new(),
            },
            faqs: stored_faqs(
                doc.section(SectionKey::LandingFaqs)
                    .map(|s| s.body.faqs())
                    .unwrap_or_default(),
            ),
            section_report: section_report(&doc.sections),
        }
    }
}

fn demonym(country: &str) -> String {
    match country {
        "India" => "Indian".to_string(),
        other => other.to_string(),
    }
}

impl From<&PageDocument> for StoredPage {
    fn from(doc: &PageDocument) -> Self {
        let task = &doc.task;
        let faqs = stored_faqs(
            doc.section(SectionKey::FaqBlock)
                .map(|s| s.body.faqs())
                .unwrap_or_default(),
        );

        Self {
            parent_slug: doc.parent_slug.clone(),
            slug: doc.routing_slug.clone(),
            url_path: doc.url_path.clone(),
            from_unit_code: task.from_code().to_string(),
            to_unit_code: task.to_code().to_string(),
            from_unit_label: task.from_label().to_string(),
            to_unit_label: task.to_label().to_string(),
            factor: task.factor(),
            from_unit_region: task.from_region().to_string(),
            to_unit_region: task.to_region().to_string(),
            city_name: task.city_hint().map(str::to_string),
            locale: doc.metadata.locale.clone(),
            site_code: doc.metadata.site_code.clone(),
            status: doc.metadata.status.clone(),
            version: doc.metadata.version,
            needs_review: doc.metadata.needs_review,
            last_updated_display_date: None,
            seo: StoredSeo::from(&doc.seo),
            popular_conversions: Vec::new(),
            why_convert_section: WhyConvertSection {
                section_heading: format!(
                    "Why convert {} to {}?",
                    task.from_label(),
                    task.to_label()
                ),
                explanation_html: prose(doc, SectionKey::WhyConvert),
            },
            standalone_sections: vec![
                StandaloneSection {
                    unit_code: task.from_code().to_string(),
                    section_heading: format!("What is {}?", task.from_label()),
                    description_html: prose(doc, SectionKey::FromUnit),
                    section_key: "fromUnit".to_string(),
                    sort_order: 1,
                },
                StandaloneSection {
                    unit_code: task.to_code().to_string(),
                    section_heading: format!("What is {}?", task.to_label()),
                    description_html: prose(doc, SectionKey::ToUnit),
                    section_key: "toUnit".to_string(),
                    sort_order: 2,
                },
            ],
            examples_section: ExamplesSection {
                content_html: prose(doc, SectionKey::Examples),
            },
            technical_details_section: TechnicalDetailsSection {
                technical_explanation_html: prose(doc, SectionKey::Technical),
                conversion_table_rows: Vec::new(),
                precision_notes_html: String::new(),
            },
            faqs,
            section_report: section_report(&doc.sections),
            page_settings: PageSettings::default(),
        }
    }
}
