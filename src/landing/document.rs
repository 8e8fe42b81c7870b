//! Composition of landing-page section results into a document.

use serde::{Deserialize, Serialize};

use crate::pipeline::{
    DocumentMetadata, PipelineConfig, SectionResult, SectionResults, SeoBlock, DOCUMENT_VERSION,
    DRAFT_STATUS,
};
use crate::sections::SectionKey;

use super::LandingBrief;

/// `pageType` of the stored landing page.
pub const LANDING_PAGE_TYPE: &str = "landing";

/// The assembled landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingDocument {
    pub slug: String,
    pub url_path: String,
    pub brief: LandingBrief,
    pub metadata: DocumentMetadata,
    pub seo: SeoBlock,
    pub sections: SectionResults,
}

impl LandingDocument {
    pub fn needs_review(&self) -> bool {
        self.metadata.needs_review
    }

    pub fn section(&self, key: SectionKey) -> Option<&SectionResult> {
        self.sections.get(&key)
    }

    /// Why the page needs review, or an empty string.
    pub fn review_summary(&self) -> String {
        self.sections
            .values()
            .filter(|s| !s.is_compliant())
            .map(SectionResult::summary)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Builds [`LandingDocument`]s from site-level metadata.
#[derive(Debug, Clone)]
pub struct LandingAssembler {
    locale: String,
    site_code: String,
    canonical_host: String,
}

impl Default for LandingAssembler {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl LandingAssembler {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            locale: config.locale.clone(),
            site_code: config.site_code.clone(),
            canonical_host: config.canonical_host.trim_end_matches('/').to_string(),
        }
    }

    /// Compose the landing document. Pure, like the pair assembler.
    pub fn assemble(&self, brief: &LandingBrief, sections: SectionResults) -> LandingDocument {
        let url_path = format!("/{}", brief.slug);
        let needs_review = sections.values().any(|s| !s.is_compliant());

        LandingDocument {
            seo: self.seo_block(brief, &url_path),
            slug: brief.slug.clone(),
            url_path,
            brief: brief.clone(),
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

    fn seo_block(&self, brief: &LandingBrief, url_path: &str) -> SeoBlock {
        let units = match brief.featured_units.as_slice() {
            [] => "square feet, acres, bighas and more".to_string(),
            labels => labels.iter().take(3).cloned().collect::<Vec<_>>().join(", ") + " and more",
        };
        let use_cases = brief.primary_use_cases.join(", ");

        SeoBlock {
            meta_title: format!(
                "{} | Convert Land and Area Units in {}",
                brief.title, brief.target_country
            ),
            meta_description: format!(
                "Free {} for {}: convert {} instantly. Unit guides, formulas and FAQs for {}.",
                brief.title.to_lowercase(),
                brief.target_country,
                units,
                use_cases
            ),
            h1_heading: format!("{} for {}", brief.title, brief.target_country),
            canonical_url: format!("{}{}", self.canonical_host, url_path),
        }
    }
}
