//! Composition of section results into a page document.

use serde::{Deserialize, Serialize};

use crate::prompts::format_factor;
use crate::sections::SectionKey;
use crate::units::{ConversionPairTask, PairIdentity, PAN_INDIA};

use super::config::PipelineConfig;
use super::orchestrator::{SectionResult, SectionResults};

/// Status given to every freshly generated document.
pub const DRAFT_STATUS: &str = "draft";

/// Schema version of generated documents.
pub const DOCUMENT_VERSION: u32 = 1;

/// URL token for a unit code: `SQ_FT` becomes `sq-ft`.
pub fn slug_token(code: &str) -> String {
    code.to_lowercase().replace('_', "-")
}

/// Routing slug for an ordered pair, e.g. `sq-m-to-sq-ft`.
///
/// Codes never contain a standalone `TO` segment, so distinct pairs cannot
/// collide and `(a, b)` and `(b, a)` always differ.
pub fn routing_slug(from_code: &str, to_code: &str) -> String {
    format!("{}-to-{}", slug_token(from_code), slug_token(to_code))
}

/// Status flags and locale of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub locale: String,
    pub site_code: String,
    pub status: String,
    pub version: u32,
    /// Set when any section is still non-compliant.
    pub needs_review: bool,
}

/// Search metadata of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoBlock {
    pub meta_title: String,
    pub meta_description: String,
    pub h1_heading: String,
    pub canonical_url: String,
}

/// A fully assembled page, ready for rendering and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    pub routing_slug: String,
    pub parent_slug: String,
    pub url_path: String,
    pub pair: PairIdentity,
    pub task: ConversionPairTask,
    pub metadata: DocumentMetadata,
    pub seo: SeoBlock,
    pub sections: SectionResults,
}

impl PageDocument {
    pub fn needs_review(&self) -> bool {
        self.metadata.needs_review
    }

    pub fn section(&self, key: SectionKey) -> Option<&SectionResult> {
        self.sections.get(&key)
    }

    /// Sections that did not reach compliance, in page order.
    pub fn degraded_sections(&self) -> Vec<&SectionResult> {
        self.sections.values().filter(|s| !s.is_compliant()).collect()
    }

    /// Why the document needs review, or an empty string.
    pub fn review_summary(&self) -> String {
        self.degraded_sections()
            .iter()
            .map(|s| s.summary())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Builds [`PageDocument`]s; holds only site-level metadata.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    locale: String,
    site_code: String,
    parent_slug: String,
    canonical_host: String,
}

impl Default for DocumentAssembler {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl DocumentAssembler {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            site_code: config.site_code.clone(),
            parent_slug: config.parent_slug.clone(),
            canonical_host: config.canonical_host.trim_end_matches('/').to_string(),
        }
    }

    /// Compose a document. Pure: the same inputs always give the same document.
    pub fn assemble(&self, task: &ConversionPairTask, sections: SectionResults) -> PageDocument {
        let slug = routing_slug(task.from_code(), task.to_code());
        let url_path = format!("/{}/{}", self.parent_slug, slug);
        let needs_review = sections.values().any(|s| !s.is_compliant());

        PageDocument {
            seo: self.seo_block(task, &url_path),
            routing_slug: slug,
            parent_slug: self.parent_slug.clone(),
            url_path,
            pair: task.identity(),
            task: task.clone(),
            metadata: DocumentMetadata {
                locale: self.locale.clone(),
                site_code: self.site_code.clone(),
                status: DRAFT_STATUS.to_string(),
                version: DOCUMENT_VERSION,
                needs_review,
            },
            sections,
        }
    }

    fn seo_block(&self, task: &ConversionPairTask, url_path: &str) -> SeoBlock {
        let from = task.from_label();
        let to = task.to_label();
        let factor = format_factor(task.factor());

        let region_note = if task.from_region() != PAN_INDIA {
            format!(" as used in {}", task.from_region())
        } else {
            String::new()
        };
        let city_note = task
            .city_hint()
            .map(|c| format!(" for property deals in {}", c))
            .unwrap_or_default();

        SeoBlock {
            meta_title: format!("{} to {} Converter | 1 {} ≈ {} {}", from, to, from, factor, to),
            meta_description: format!(
                "Convert {}{} to {} instantly. 1 {} ≈ {} {}. Formula, worked examples and FAQs{}.",
                from, region_note, to, from, factor, to, city_note
            ),
            h1_heading: format!("Convert {} to {}", from, to),
            canonical_url: format!("{}{}", self.canonical_host, url_path),
        }
    }
}
