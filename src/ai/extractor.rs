//! Recovery of a JSON object from free-form provider text
//!
//! Providers wrap JSON in markdown fences or surround it with prose. The
//! extractor strips fence markers, finds the first `{`, and walks forward
//! counting braces outside string literals until the matching `}`. Only that
//! first balanced object is parsed.

use crate::error::{ExtractionFailed, ExtractionFailure};
use serde_json::{Map, Value};

/// Extract the first balanced JSON object from `raw_text`
///
/// # Errors
///
/// Returns `ExtractionFailed` carrying the untouched input when there is no
/// opening brace, the braces never balance, or the balanced span is not a
/// valid JSON object.
pub fn extract_object(raw_text: &str) -> Result<Map<String, Value>, ExtractionFailed> {
    let fail = |reason| ExtractionFailed {
        reason,
        raw_text: raw_text.to_string(),
    };

    let text = strip_fences(raw_text);
    let start = text
        .find('{')
        .ok_or_else(|| fail(ExtractionFailure::NoOpeningBrace))?;
    let end = matching_brace(text, start).ok_or_else(|| fail(ExtractionFailure::Unbalanced))?;

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(other) => Err(fail(ExtractionFailure::Parse(format!(
            "expected an object, found {}",
            other
        )))),
        Err(e) => Err(fail(ExtractionFailure::Parse(e.to_string()))),
    }
}

/// Remove a leading fence line (```` ``` ```` or ```` ```json ````) and a trailing fence
fn strip_fences(raw_text: &str) -> &str {
    let mut text = raw_text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) on the fence line
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Byte index of the `}` closing the object that opens at `start`
fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    // All delimiters are ASCII, so byte positions are valid char boundaries.
    for (offset, byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_fenced_json_exactly() {
        let raw = "```json\n{\"severity\":\"high\",\"confidence\":0.9}\n```";
        let object = extract_object(raw).unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["severity"], json!("high"));
        assert_eq!(object["confidence"], json!(0.9));
    }

    #[test]
    fn test_extracts_from_bare_fence_and_prose() {
        let fenced = "```\n{\"trend\": \"rising\"}\n```";
        assert_eq!(extract_object(fenced).unwrap()["trend"], json!("rising"));

        let prose = "Here's the analysis:\n\n```json\n{\"overallScore\": 85}\n```\n\nThat's my assessment.";
        assert_eq!(extract_object(prose).unwrap()["overallScore"], json!(85));

        let inline = "The analysis shows: {\"riskScore\": 40} - end of analysis";
        assert_eq!(extract_object(inline).unwrap()["riskScore"], json!(40));
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        let raw = r#"{"message": "zone {A} is } full", "nested": {"note": "quote \" and { brace"}} trailing }"#;
        let object = extract_object(raw).unwrap();

        assert_eq!(object["message"], json!("zone {A} is } full"));
        assert_eq!(object["nested"]["note"], json!("quote \" and { brace"));
    }

    #[test]
    fn test_only_first_object_is_used() {
        let raw = r#"{"severity": "low"} and later {"severity": "critical"}"#;
        let object = extract_object(raw).unwrap();
        assert_eq!(object["severity"], json!("low"));
    }

    #[test]
    fn test_no_json_fails_with_raw_text() {
        let err = extract_object("no json here").unwrap_err();
        assert_eq!(err.reason, ExtractionFailure::NoOpeningBrace);
        assert_eq!(err.raw_text, "no json here");
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = extract_object("{\"summary\": \"test\", \"missing_closing_brace\"").unwrap_err();
        assert_eq!(err.reason, ExtractionFailure::Unbalanced);

        let err = extract_object("{\"open\": \"string never closes }").unwrap_err();
        assert_eq!(err.reason, ExtractionFailure::Unbalanced);
    }

    #[test]
    fn test_balanced_but_invalid_json() {
        let err = extract_object("{severity: high}").unwrap_err();
        assert!(matches!(err.reason, ExtractionFailure::Parse(_)));
        assert_eq!(err.raw_text, "{severity: high}");
    }

    #[test]
    fn test_multibyte_text_around_object() {
        let raw = "Résumé 👍 {\"replyText\": \"Zone « B » est pleine\"} ✓";
        let object = extract_object(raw).unwrap();
        assert_eq!(object["replyText"], json!("Zone « B » est pleine"));
    }
}
