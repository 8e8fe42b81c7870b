//! The conversion-pair task handed to the generation pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::codes::{validate_region, validate_unit_code};

/// One ordered unit pair for which a page is generated.
///
/// Fields are private so a task can only be built through [`ConversionPairTask::new`],
/// which checks the codes, factor and regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionPairTask {
    from_code: String,
    to_code: String,
    from_label: String,
    to_label: String,
    factor: f64,
    from_region: String,
    to_region: String,
    city_hint: Option<String>,
}

/// Identity of a task: the ordered `(from, to)` code pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairIdentity {
    pub from_code: String,
    pub to_code: String,
}

impl fmt::Display for PairIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from_code, self.to_code)
    }
}

impl ConversionPairTask {
    /// Build a task, rejecting values that would produce a broken page.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        from_code: impl Into<String>,
        to_code: impl Into<String>,
        from_label: impl Into<String>,
        to_label: impl Into<String>,
        factor: f64,
        from_region: impl Into<String>,
        to_region: impl Into<String>,
        city_hint: Option<String>,
    ) -> Result<Self, String> {
        let task = Self {
            from_code: from_code.into(),
            to_code: to_code.into(),
            from_label: from_label.into().trim().to_string(),
            to_label: to_label.into().trim().to_string(),
            factor,
            from_region: from_region.into().trim().to_string(),
            to_region: to_region.into().trim().to_string(),
            city_hint: city_hint
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        };

        validate_unit_code(&task.from_code)?;
        validate_unit_code(&task.to_code)?;
        if task.from_code == task.to_code {
            return Err(format!("self-conversion {} -> {}", task.from_code, task.to_code));
        }
        if task.from_label.is_empty() || task.to_label.is_empty() {
            return Err("unit labels must not be empty".to_string());
        }
        if !task.factor.is_finite() || task.factor <= 0.0 {
            return Err(format!("factor {} must be a positive number", task.factor));
        }
        validate_region(&task.from_region)?;
        validate_region(&task.to_region)?;

        Ok(task)
    }

    pub fn from_code(&self) -> &str {
        &self.from_code
    }

    pub fn to_code(&self) -> &str {
        &self.to_code
    }

    pub fn from_label(&self) -> &str {
        &self.from_label
    }

    pub fn to_label(&self) -> &str {
        &self.to_label
    }

    /// `1 from ≈ factor to`.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn from_region(&self) -> &str {
        &self.from_region
    }

    pub fn to_region(&self) -> &str {
        &self.to_region
    }

    pub fn city_hint(&self) -> Option<&str> {
        self.city_hint.as_deref()
    }

    pub fn identity(&self) -> PairIdentity {
        PairIdentity {
            from_code: self.from_code.clone(),
            to_code: self.to_code.clone(),
        }
    }

    /// Sentence that keeps generated copy directional.
    pub fn direction_note(&self) -> String {
        format!(
            "This page is specifically about converting FROM {from} TO {to}. \
             Make the content clearly directional and do not write generic text \
             that would equally fit the reverse ({to} to {from}).",
            from = self.from_label,
            to = self.to_label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqm_to_sqft() -> ConversionPairTask {
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

    #[test]
    fn test_task_accessors_and_identity() {
        let task = sqm_to_sqft();
        assert_eq!(task.from_code(), "SQ_M");
        assert_eq!(task.to_label(), "Square Feet");
        assert_eq!(task.city_hint(), Some("Mumbai"));
        assert_eq!(task.identity().to_string(), "SQ_M -> SQ_FT");
        assert!(task.direction_note().contains("FROM Square Meter TO Square Feet"));
    }

    #[test]
    fn test_task_rejects_bad_values() {
        let bad_factor = ConversionPairTask::new(
            "SQ_M", "SQ_FT", "Square Meter", "Square Feet", 0.0, "Pan-India", "Pan-India", None,
        );
        assert!(bad_factor.is_err());

        let nan = ConversionPairTask::new(
            "SQ_M", "SQ_FT", "Square Meter", "Square Feet", f64::NAN, "Pan-India", "Pan-India",
            None,
        );
        assert!(nan.is_err());

        let same = ConversionPairTask::new(
            "ACRE", "ACRE", "Acre", "Acre", 1.0, "Pan-India", "Pan-India", None,
        );
        assert!(same.is_err());

        let bad_region = ConversionPairTask::new(
            "SQ_M", "SQ_FT", "Square Meter", "Square Feet", 10.7639, "Pan-India", "<b>", None,
        );
        assert!(bad_region.is_err());
    }

    #[test]
    fn test_blank_city_hint_is_dropped() {
        let task = ConversionPairTask::new(
            "ACRE",
            "HECTARE",
            "Acre",
            "Hectare",
            0.404686,
            "Pan-India",
            "Pan-India",
            Some("  ".to_string()),
        )
        .unwrap();
        assert_eq!(task.city_hint(), None);
    }
}
