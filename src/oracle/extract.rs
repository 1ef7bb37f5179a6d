//! Pulling the structured payload out of free-form model text.

use serde_json::Value;

use super::client::{OracleError, OracleResult};

/// Extract the JSON object spanning the first `{` to the last `}` of `text`.
///
/// Models often wrap their JSON in prose or code fences; anything outside the
/// outermost braces is ignored. Fails with [`OracleError::Parse`] when no
/// braces are present, the span is not valid JSON, or it is not an object.
pub fn extract_json(text: &str) -> OracleResult<Value> {
    let start = text.find('{');
    let end = text.rfind('}');
    let span = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(OracleError::Parse(format!("no JSON object in reply: {}", preview(text)))),
    };

    let value: Value = serde_json::from_str(span)
        .map_err(|e| OracleError::Parse(format!("{}: {}", e, preview(span))))?;
    if !value.is_object() {
        return Err(OracleError::Parse(format!("payload is not an object: {}", preview(span))));
    }
    Ok(value)
}

fn preview(text: &str) -> String {
    let shown: String = text.chars().take(200).collect();
    if shown.len() < text.len() {
        format!("{}...", shown)
    } else {
        shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_bare_object() {
        let value = extract_json(r#"{"action":"done","why":"ok"}"#).unwrap();
        assert_eq!(value, json!({"action": "done", "why": "ok"}));
    }

    #[test]
    fn test_extracts_from_code_fence() {
        let text = "Sure!\n```json\n{\n  \"verdict\": \"pass\",\n  \"notes\": \"a {nested} brace\"\n}\n```\n";
        let value = extract_json(text).unwrap();
        assert_eq!(value["verdict"], "pass");
        assert_eq!(value["notes"], "a {nested} brace");
    }

    #[test]
    fn test_no_braces_is_parse_error() {
        let err = extract_json("I cannot help with that.").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = extract_json("{action: tap}").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_two_objects_span_is_rejected() {
        // Greedy span covers both objects and is not valid JSON.
        let err = extract_json(r#"{"a":1} and {"b":2}"#).unwrap_err();
        assert!(err.is_parse());
    }
}
