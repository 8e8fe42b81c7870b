//! The landing page that parents every conversion page.
//!
//! The landing page lives at `/<parent_slug>` and is produced with the same
//! machinery as conversion pages: sections are drafted one at a time,
//! checked against [`crate::sections::LANDING_POLICIES`] and regenerated
//! until they comply, then previewed and persisted under the same
//! withholding rule.

pub mod builder;
pub mod document;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::generation::PageSubject;
use crate::pipeline::PipelineConfig;
use crate::units::ConversionPairTask;

pub use builder::{LandingBuilder, LandingOutcome, LandingReport};
pub use document::{LandingAssembler, LandingDocument, LANDING_PAGE_TYPE};

/// Most unit labels quoted in landing prompts.
pub const MAX_FEATURED_UNITS: usize = 12;

/// What the landing page is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandingBrief {
    pub slug: String,
    pub title: String,
    pub target_country: String,
    pub primary_use_cases: Vec<String>,
    /// Unit labels the page should mention, in first-seen order.
    pub featured_units: Vec<String>,
}

impl Default for LandingBrief {
    fn default() -> Self {
        Self {
            slug: "area-convertor".to_string(),
            title: "Area Converter".to_string(),
            target_country: "India".to_string(),
            primary_use_cases: vec![
                "real estate".to_string(),
                "construction".to_string(),
                "land measurement".to_string(),
            ],
            featured_units: Vec::new(),
        }
    }
}

impl LandingBrief {
    /// Brief for the parent page of a run's conversion pages.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            slug: config.parent_slug.clone(),
            ..Self::default()
        }
    }

    pub fn with_target_country(mut self, country: impl Into<String>) -> Self {
        self.target_country = country.into();
        self
    }

    pub fn with_use_cases(mut self, use_cases: Vec<String>) -> Self {
        self.primary_use_cases = use_cases;
        self
    }

    /// Keep the first [`MAX_FEATURED_UNITS`] distinct, non-blank labels.
    pub fn with_featured_units(mut self, units: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        self.featured_units = units
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty() && seen.insert(u.clone()))
            .take(MAX_FEATURED_UNITS)
            .collect();
        self
    }

    /// Feature the units of a set of conversion pairs, FROM label before TO
    /// label, in input order.
    pub fn featuring_tasks<'a>(self, tasks: impl IntoIterator<Item = &'a ConversionPairTask>) -> Self {
        let labels = tasks
            .into_iter()
            .flat_map(|t| [t.from_label().to_string(), t.to_label().to_string()])
            .collect();
        self.with_featured_units(labels)
    }
}

impl PageSubject for LandingBrief {
    fn label(&self) -> String {
        self.slug.clone()
    }
}
