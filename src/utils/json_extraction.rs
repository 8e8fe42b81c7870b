//! JSON extraction from model responses.
//!
//! Models are asked for a bare JSON object but regularly wrap it in a code
//! fence or put a sentence in front of it. The strategies below are tried in
//! order:
//! 1. a ```json fenced block
//! 2. any fenced block containing an object
//! 3. the content itself when it starts with `{`
//! 4. the largest parseable object anywhere, preferring later ones

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Error type for JSON extraction failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated: {unclosed_braces} unclosed braces. Partial: {partial_preview}...")]
    Truncated {
        partial_preview: String,
        unclosed_braces: usize,
    },
    #[error("No JSON content found in response. Content starts with: '{content_preview}'")]
    NotFound { content_preview: String },
}

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").expect("static regex"))
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").expect("static regex"))
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Extract a JSON object from a model response.
pub fn try_extract_json_object(content: &str) -> Result<String, JsonExtractionError> {
    let trimmed = content.trim();

    if let Some(json) = extract_from_json_code_block(trimmed) {
        if parses(&json) {
            return Ok(json);
        }
    }

    if let Some(json) = extract_from_generic_code_block(trimmed) {
        if parses(&json) {
            return Ok(json);
        }
    }

    if trimmed.starts_with('{') {
        if let Some(end) = find_matching_brace(trimmed) {
            let candidate = &trimmed[..=end];
            if parses(candidate) {
                return Ok(candidate.to_string());
            }
        } else {
            return Err(JsonExtractionError::Truncated {
                partial_preview: preview(trimmed, 100),
                unclosed_braces: unclosed_braces(trimmed),
            });
        }
    }

    if let Some(json) = extract_last_valid_json_object(trimmed) {
        return Ok(json);
    }

    if let Some(start) = trimmed.find('{') {
        let tail = &trimmed[start..];
        if find_matching_brace(tail).is_none() {
            return Err(JsonExtractionError::Truncated {
                partial_preview: preview(tail, 100),
                unclosed_braces: unclosed_braces(tail),
            });
        }
    }

    Err(JsonExtractionError::NotFound {
        content_preview: preview(trimmed, 50),
    })
}

/// Index of the `}` closing the object `s` starts with.
///
/// Braces inside string literals, including escaped quotes, are ignored.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Extract JSON from a ```json ... ``` code block.
pub fn extract_from_json_code_block(content: &str) -> Option<String> {
    let caps = json_fence().captures(content)?;
    let json_content = caps.get(1)?.as_str().trim();
    if !json_content.starts_with('{') {
        return None;
    }
    match find_matching_brace(json_content) {
        Some(end) => Some(json_content[..=end].to_string()),
        None => Some(json_content.to_string()),
    }
}

/// Extract the first object inside a generic ``` ... ``` code block.
pub fn extract_from_generic_code_block(content: &str) -> Option<String> {
    let caps = any_fence().captures(content)?;
    let block = caps.get(1)?.as_str().trim();
    let start = block.find('{')?;
    let end = find_matching_brace(&block[start..])?;
    Some(block[start..=start + end].to_string())
}

/// Largest parseable object in `content`; ties go to the later one.
pub fn extract_last_valid_json_object(content: &str) -> Option<String> {
    content
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .filter_map(|(start, _)| {
            let substr = &content[start..];
            let end = find_matching_brace(substr)?;
            let candidate = &substr[..=end];
            parses(candidate).then(|| (start, candidate.to_string()))
        })
        .max_by(|(pos_a, a), (pos_b, b)| a.len().cmp(&b.len()).then(pos_a.cmp(pos_b)))
        .map(|(_, json)| json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        let json = try_extract_json_object(r#"{"examples_section_html": "<p>x</p>"}"#).unwrap();
        assert!(json.contains("examples_section_html"));
    }

    #[test]
    fn test_fenced_object() {
        let content = "Sure:\n```json\n{\"faqs\": []}\n```\nDone.";
        assert_eq!(try_extract_json_object(content).unwrap(), "{\"faqs\": []}");
    }

    #[test]
    fn test_generic_fence() {
        let content = "```\n{\"a\": 1}\n```";
        assert_eq!(try_extract_json_object(content).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_object_after_prose_prefers_largest() {
        let content = r#"I considered {"a": 1} but the answer is {"a": 1, "b": {"c": 2}}"#;
        assert_eq!(
            try_extract_json_object(content).unwrap(),
            r#"{"a": 1, "b": {"c": 2}}"#
        );
    }

    #[test]
    fn test_braces_in_strings() {
        let s = r#"{"html": "<p>{not a brace}</p> \"q\""} tail"#;
        let end = find_matching_brace(s).unwrap();
        assert_eq!(&s[end..=end], "}");
        assert!(parses(&s[..=end]));
    }

    #[test]
    fn test_truncated_object() {
        let err = try_extract_json_object(r#"{"faqs": [{"question": "Q""#).unwrap_err();
        assert!(matches!(
            err,
            JsonExtractionError::Truncated {
                unclosed_braces: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_not_found() {
        let err = try_extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, JsonExtractionError::NotFound { .. }));
    }
}
