//! Unit-code normalisation and regional context inference.

use regex::Regex;
use std::sync::OnceLock;

/// Region tag used when a unit is not tied to a particular state.
pub const PAN_INDIA: &str = "Pan-India";

/// City used by the batch CLI when no region token suggests one.
pub const DEFAULT_CITY: &str = "Mumbai";

/// Labels that map onto fixed, widely-used unit codes.
const SPECIAL_CODES: &[(&str, &str)] = &[
    ("Square Meter", "SQ_M"),
    ("Square Meters", "SQ_M"),
    ("Square Meteres", "SQ_M"),
    ("Square Feet", "SQ_FT"),
    ("Square Foot", "SQ_FT"),
    ("Square Yard", "SQ_YD"),
    ("Square Inch", "SQ_IN"),
    ("Square Kilometer", "SQ_KM"),
    ("Square Mile", "SQ_MI"),
    ("Acre", "ACRE"),
    ("Hectare", "HECTARE"),
];

/// Region token -> representative city, checked in order.
const REGION_TO_CITY: &[(&str, &str)] = &[
    ("Assam", "Guwahati"),
    ("Bengal", "Kolkata"),
    ("Bihar", "Patna"),
    ("Jharkhand", "Ranchi"),
    ("Tripura", "Agartala"),
    ("Gujarat", "Ahmedabad"),
    ("Rajasthan", "Jaipur"),
    ("Punjab", "Chandigarh"),
    ("Haryana", "Gurugram"),
    ("HP", "Shimla"),
    ("Himachal", "Shimla"),
    ("Uttarakhand", "Dehradun"),
    ("UP", "Lucknow"),
    ("MP", "Bhopal"),
];

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9A-Za-z]+").expect("static regex"))
}

fn code_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]+(_[A-Z0-9]+)*$").expect("static regex"))
}

/// Turn a human-readable unit label into a unit code.
///
/// Known labels go through the special-code table; anything else has runs of
/// non-alphanumerics collapsed to `_` and is upper-cased, so
/// `"Bigha – Assam"` becomes `BIGHA_ASSAM`.
pub fn normalize_unit_code(label: &str) -> String {
    let clean = label.trim();
    if let Some((_, code)) = SPECIAL_CODES.iter().find(|(name, _)| *name == clean) {
        return (*code).to_string();
    }

    non_alnum()
        .replace_all(clean, "_")
        .trim_matches('_')
        .to_uppercase()
}

/// Check that a unit code is usable in a routing slug.
///
/// Codes are upper-case alphanumeric segments joined by single underscores.
/// A standalone `TO` segment is refused: it would make `A_TO_B -> C` and
/// `A -> B_TO_C` share the slug `a-to-b-to-c`.
pub fn validate_unit_code(code: &str) -> Result<(), String> {
    if !code_shape().is_match(code) {
        return Err(format!(
            "unit code '{}' must be upper-case alphanumerics joined by '_'",
            code
        ));
    }
    if code.split('_').any(|segment| segment == "TO") {
        return Err(format!(
            "unit code '{}' must not contain a standalone TO segment",
            code
        ));
    }
    Ok(())
}

/// Extract the region or state from labels such as `"Bigha – Assam"` or
/// `"Dhur-Bihar"`. Returns `None` when the label carries no region suffix.
pub fn extract_region(label: &str) -> Option<String> {
    let name = label.trim();
    for sep in ['–', '—', '-'] {
        if name.contains(sep) {
            let parts: Vec<&str> = name
                .split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() >= 2 {
                return parts.last().map(|p| p.to_string());
            }
        }
    }
    None
}

/// Guess a city from region tokens in either label, falling back to `default_city`.
pub fn guess_city(from_label: &str, to_label: &str, default_city: Option<&str>) -> Option<String> {
    for label in [from_label, to_label] {
        let lower = label.to_lowercase();
        for (region, city) in REGION_TO_CITY {
            if lower.contains(&region.to_lowercase()) {
                return Some((*city).to_string());
            }
        }
    }
    default_city.map(str::to_string)
}

/// Check a region tag for characters that cannot appear in page metadata.
pub fn validate_region(region: &str) -> Result<(), String> {
    let ok = region
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '&' | '.' | '(' | ')'));
    if ok && !region.trim().is_empty() {
        Ok(())
    } else {
        Err(format!("region '{}' is not a valid region tag", region))
    }
}
