//! Section kinds and their length policies.
//!
//! The policy tables are the single place that decide how long each section
//! must be; the orchestrator, the prompts and the CLI all read from them.
//! Conversion pages use [`DEFAULT_POLICIES`], the parent landing page uses
//! [`LANDING_POLICIES`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of page sections: conversion-page sections first, then
/// landing-page sections, each group in page order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    /// Why someone converts from the source unit to the target unit.
    WhyConvert,
    /// What the source unit is.
    FromUnit,
    /// What the target unit is.
    ToUnit,
    /// Worked conversions.
    Examples,
    /// Formula and precision notes.
    Technical,
    /// The FAQ collection.
    FaqBlock,
    /// What the converter tool is for (landing page).
    Description,
    /// Short heading/subheading feature blocks (landing page).
    Highlights,
    /// Overview of the major units the site covers (landing page).
    MajorUnits,
    /// Common conversion formulas (landing page).
    Formulas,
    /// The landing-page FAQ collection.
    LandingFaqs,
}

impl SectionKey {
    /// Sections of a conversion page.
    pub const PAIR_PAGE: [SectionKey; 6] = [
        SectionKey::WhyConvert,
        SectionKey::FromUnit,
        SectionKey::ToUnit,
        SectionKey::Examples,
        SectionKey::Technical,
        SectionKey::FaqBlock,
    ];

    /// Sections of the parent landing page.
    pub const LANDING_PAGE: [SectionKey; 5] = [
        SectionKey::Description,
        SectionKey::Highlights,
        SectionKey::MajorUnits,
        SectionKey::Formulas,
        SectionKey::LandingFaqs,
    ];

    fn all() -> impl Iterator<Item = SectionKey> {
        Self::PAIR_PAGE.into_iter().chain(Self::LANDING_PAGE)
    }

    pub fn is_landing(&self) -> bool {
        Self::LANDING_PAGE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::WhyConvert => "why_convert",
            SectionKey::FromUnit => "from_unit",
            SectionKey::ToUnit => "to_unit",
            SectionKey::Examples => "examples",
            SectionKey::Technical => "technical",
            SectionKey::FaqBlock => "faq_block",
            SectionKey::Description => "description",
            SectionKey::Highlights => "highlights",
            SectionKey::MajorUnits => "major_units",
            SectionKey::Formulas => "formulas",
            SectionKey::LandingFaqs => "landing_faqs",
        }
    }

    /// JSON key the model answers under when generating this section.
    pub fn output_field(&self) -> &'static str {
        match self {
            SectionKey::WhyConvert => "why_convert_section_html",
            SectionKey::FromUnit => "from_unit_section_html",
            SectionKey::ToUnit => "to_unit_section_html",
            SectionKey::Examples => "examples_section_html",
            SectionKey::Technical => "technical_details_html",
            SectionKey::FaqBlock | SectionKey::LandingFaqs => "faqs",
            SectionKey::Description => "description_section_html",
            SectionKey::Highlights => "highlight_blocks",
            SectionKey::MajorUnits => "major_units_copy_html",
            SectionKey::Formulas => "formulas_section_html",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionKey::all()
            .find(|key| key.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<&str> = SectionKey::all().map(|k| k.as_str()).collect();
                format!("unknown section '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Structural shape of a section body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionShape {
    /// A single HTML fragment.
    Prose,
    /// An ordered list of items; the word window applies to each item.
    Collection { min_items: usize, max_items: usize },
}

/// Word-count window for one section kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPolicy {
    pub key: SectionKey,
    pub min_words: usize,
    pub max_words: usize,
    pub shape: SectionShape,
}

impl SectionPolicy {
    pub const fn prose(key: SectionKey, min_words: usize, max_words: usize) -> Self {
        Self {
            key,
            min_words,
            max_words,
            shape: SectionShape::Prose,
        }
    }

    pub const fn collection(
        key: SectionKey,
        min_words: usize,
        max_words: usize,
        min_items: usize,
        max_items: usize,
    ) -> Self {
        Self {
            key,
            min_words,
            max_words,
            shape: SectionShape::Collection {
                min_items,
                max_items,
            },
        }
    }
}

/// Default policy table, one entry per section kind in page order.
pub const DEFAULT_POLICIES: [SectionPolicy; 6] = [
    SectionPolicy::prose(SectionKey::WhyConvert, 220, 260),
    SectionPolicy::prose(SectionKey::FromUnit, 230, 290),
    SectionPolicy::prose(SectionKey::ToUnit, 230, 290),
    SectionPolicy::prose(SectionKey::Examples, 90, 200),
    SectionPolicy::prose(SectionKey::Technical, 150, 200),
    SectionPolicy::collection(SectionKey::FaqBlock, 90, 140, 4, 5),
];

/// Landing-page policy table, in page order. Highlight windows apply to
/// each block's subheading.
pub const LANDING_POLICIES: [SectionPolicy; 5] = [
    SectionPolicy::prose(SectionKey::Description, 180, 260),
    SectionPolicy::collection(SectionKey::Highlights, 8, 30, 3, 6),
    SectionPolicy::prose(SectionKey::MajorUnits, 150, 250),
    SectionPolicy::prose(SectionKey::Formulas, 120, 220),
    SectionPolicy::collection(SectionKey::LandingFaqs, 60, 120, 5, 8),
];

/// Owned copy of [`DEFAULT_POLICIES`].
pub fn default_policies() -> Vec<SectionPolicy> {
    DEFAULT_POLICIES.to_vec()
}

/// Owned copy of [`LANDING_POLICIES`].
pub fn landing_policies() -> Vec<SectionPolicy> {
    LANDING_POLICIES.to_vec()
}

/// Look up the default policy for a section kind.
pub fn default_policy(key: SectionKey) -> SectionPolicy {
    DEFAULT_POLICIES
        .iter()
        .chain(LANDING_POLICIES.iter())
        .copied()
        .find(|p| p.key == key)
        .unwrap_or(SectionPolicy::prose(key, 0, usize::MAX))
}

/// One question/answer pair of the FAQ collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer_html: String,
}

/// One feature block of the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightBlock {
    pub heading: String,
    pub subheading: String,
}

/// Generated content of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum SectionBody {
    Prose(String),
    Faqs(Vec<FaqEntry>),
    Highlights(Vec<HighlightBlock>),
}

impl SectionBody {
    /// Placeholder body for a section whose generation never succeeded.
    pub fn empty_for(policy: &SectionPolicy) -> Self {
        match (policy.shape, policy.key) {
            (SectionShape::Prose, _) => SectionBody::Prose(String::new()),
            (SectionShape::Collection { .. }, SectionKey::Highlights) => {
                SectionBody::Highlights(Vec::new())
            }
            (SectionShape::Collection { .. }, _) => SectionBody::Faqs(Vec::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SectionBody::Prose(html) => html.trim().is_empty(),
            SectionBody::Faqs(items) => items.is_empty(),
            SectionBody::Highlights(blocks) => blocks.is_empty(),
        }
    }

    /// HTML of a prose body; collection bodies return `None`.
    pub fn html(&self) -> Option<&str> {
        match self {
            SectionBody::Prose(html) => Some(html),
            _ => None,
        }
    }

    /// Items of a FAQ body; other bodies return an empty slice.
    pub fn faqs(&self) -> &[FaqEntry] {
        match self {
            SectionBody::Faqs(items) => items,
            _ => &[],
        }
    }

    /// Blocks of a highlights body; other bodies return an empty slice.
    pub fn highlights(&self) -> &[HighlightBlock] {
        match self {
            SectionBody::Highlights(blocks) => blocks,
            _ => &[],
        }
    }

    /// Per-item texts a collection window applies to: FAQ answers or
    /// highlight subheadings. Prose bodies have no items.
    pub fn item_texts(&self) -> Vec<&str> {
        match self {
            SectionBody::Prose(_) => Vec::new(),
            SectionBody::Faqs(items) => items.iter().map(|f| f.answer_html.as_str()).collect(),
            SectionBody::Highlights(blocks) => {
                blocks.iter().map(|b| b.subheading.as_str()).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_section_once() {
        let keys: Vec<SectionKey> = DEFAULT_POLICIES.iter().map(|p| p.key).collect();
        assert_eq!(keys, SectionKey::PAIR_PAGE.to_vec());
        let keys: Vec<SectionKey> = LANDING_POLICIES.iter().map(|p| p.key).collect();
        assert_eq!(keys, SectionKey::LANDING_PAGE.to_vec());
        for policy in DEFAULT_POLICIES.iter().chain(LANDING_POLICIES.iter()) {
            assert!(policy.min_words <= policy.max_words, "{}", policy.key);
        }
    }

    #[test]
    fn test_section_key_round_trips_through_str() {
        for key in SectionKey::all() {
            assert_eq!(key.as_str().parse::<SectionKey>().unwrap(), key);
        }
        assert!("intro".parse::<SectionKey>().is_err());
        assert!("landing_faqs".parse::<SectionKey>().unwrap().is_landing());
        assert!(!SectionKey::FaqBlock.is_landing());
    }

    #[test]
    fn test_default_policy_lookup() {
        let faq = default_policy(SectionKey::FaqBlock);
        assert_eq!(
            faq.shape,
            SectionShape::Collection {
                min_items: 4,
                max_items: 5
            }
        );
        assert_eq!(default_policy(SectionKey::WhyConvert).min_words, 220);
        assert_eq!(default_policy(SectionKey::Formulas).max_words, 220);
    }

    #[test]
    fn test_body_helpers() {
        let prose = SectionBody::Prose("<p>hi</p>".to_string());
        assert_eq!(prose.html(), Some("<p>hi</p>"));
        assert!(prose.faqs().is_empty());

        let empty = SectionBody::empty_for(&default_policy(SectionKey::FaqBlock));
        assert!(empty.is_empty());
        assert_eq!(empty.html(), None);

        let blocks = SectionBody::empty_for(&default_policy(SectionKey::Highlights));
        assert_eq!(blocks, SectionBody::Highlights(Vec::new()));

        let highlights = SectionBody::Highlights(vec![HighlightBlock {
            heading: "Fast".to_string(),
            subheading: "Instant results for every unit".to_string(),
        }]);
        assert_eq!(highlights.item_texts(), vec!["Instant results for every unit"]);
        assert!(highlights.faqs().is_empty());
        assert!(prose.item_texts().is_empty());
    }
}
