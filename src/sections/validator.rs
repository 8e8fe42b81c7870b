//! Word-count validation of generated sections.
//!
//! Everything here is pure: the same text and policy always give the same
//! verdict.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::policy::{SectionBody, SectionKey, SectionPolicy, SectionShape};

/// Verdict of a length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthStatus {
    Compliant,
    TooShort,
    TooLong,
}

impl LengthStatus {
    pub fn is_compliant(&self) -> bool {
        matches!(self, LengthStatus::Compliant)
    }
}

impl fmt::Display for LengthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LengthStatus::Compliant => "compliant",
            LengthStatus::TooShort => "too_short",
            LengthStatus::TooLong => "too_long",
        };
        f.write_str(s)
    }
}

/// One reason a section failed its policy, phrased for humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthIssue {
    /// A prose body, or one collection item when `item` is set, is out of range.
    Words {
        key: SectionKey,
        item: Option<usize>,
        words: usize,
        min: usize,
        max: usize,
    },
    /// The collection has too few or too many items.
    Items {
        key: SectionKey,
        count: usize,
        min: usize,
        max: usize,
    },
}

impl fmt::Display for LengthIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthIssue::Words {
                key,
                item: None,
                words,
                min,
                max,
            } => write!(f, "{}: {} words (expected {}–{})", key, words, min, max),
            LengthIssue::Words {
                key,
                item: Some(i),
                words,
                min,
                max,
            } => write!(f, "{}[{}]: {} words (expected {}–{})", key, i, words, min, max),
            LengthIssue::Items {
                key,
                count,
                min,
                max,
            } => write!(f, "{}: {} items (expected {}–{})", key, count, min, max),
        }
    }
}

/// Full outcome of checking one section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthCheck {
    pub status: LengthStatus,
    /// Prose: words in the body. Collections: total words over all items.
    pub word_count: usize,
    pub issues: Vec<LengthIssue>,
}

fn html_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Count words in an HTML fragment: tags are replaced by spaces, then
/// whitespace-separated tokens are counted.
pub fn word_count(text: &str) -> usize {
    html_tag().replace_all(text, " ").split_whitespace().count()
}

fn status_for(words: usize, min: usize, max: usize) -> LengthStatus {
    if words < min {
        LengthStatus::TooShort
    } else if words > max {
        LengthStatus::TooLong
    } else {
        LengthStatus::Compliant
    }
}

/// Check prose text against a policy window. Both bounds are inclusive.
pub fn validate(text: &str, policy: &SectionPolicy) -> LengthStatus {
    status_for(word_count(text), policy.min_words, policy.max_words)
}

/// Check a whole section body, collecting every issue found.
///
/// For collections the item count and every item text (FAQ answer or
/// highlight subheading) are checked; a short finding wins over a long one
/// so the next pass asks for more content.
pub fn check_body(body: &SectionBody, policy: &SectionPolicy) -> LengthCheck {
    match (body, policy.shape) {
        (SectionBody::Prose(text), SectionShape::Prose) => check_prose(text, policy),
        (_, SectionShape::Prose) => check_prose(&body.item_texts().join(" "), policy),
        (_, SectionShape::Collection { min_items, max_items }) => {
            check_collection(&body.item_texts(), policy, min_items, max_items)
        }
    }
}

fn check_prose(text: &str, policy: &SectionPolicy) -> LengthCheck {
    let words = word_count(text);
    let status = status_for(words, policy.min_words, policy.max_words);
    let issues = if status.is_compliant() {
        Vec::new()
    } else {
        vec![LengthIssue::Words {
            key: policy.key,
            item: None,
            words,
            min: policy.min_words,
            max: policy.max_words,
        }]
    };
    LengthCheck {
        status,
        word_count: words,
        issues,
    }
}

fn check_collection(
    items: &[&str],
    policy: &SectionPolicy,
    min_items: usize,
    max_items: usize,
) -> LengthCheck {
    let mut issues = Vec::new();
    let mut short = false;
    let mut long = false;

    match status_for(items.len(), min_items, max_items) {
        LengthStatus::TooShort => short = true,
        LengthStatus::TooLong => long = true,
        LengthStatus::Compliant => {}
    }
    if short || long {
        issues.push(LengthIssue::Items {
            key: policy.key,
            count: items.len(),
            min: min_items,
            max: max_items,
        });
    }

    let mut total = 0;
    for (i, item) in items.iter().enumerate() {
        let words = word_count(item);
        total += words;
        match status_for(words, policy.min_words, policy.max_words) {
            LengthStatus::Compliant => continue,
            LengthStatus::TooShort => short = true,
            LengthStatus::TooLong => long = true,
        }
        issues.push(LengthIssue::Words {
            key: policy.key,
            item: Some(i),
            words,
            min: policy.min_words,
            max: policy.max_words,
        });
    }

    let status = if short {
        LengthStatus::TooShort
    } else if long {
        LengthStatus::TooLong
    } else {
        LengthStatus::Compliant
    };

    LengthCheck {
        status,
        word_count: total,
        issues,
    }
}
