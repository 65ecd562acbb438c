//! JSON extraction and best-effort repair of model output.
//!
//! Parsing is a capped loop: the raw extraction is tried first, then up to
//! `repair_attempts` progressively more aggressive repair passes. Exhausting
//! the passes is an error; nothing is silently coerced.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;

use super::AiError;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)```").unwrap();
    static ref TRAILING_COMMA: Regex = Regex::new(r",(\s*[}\]])").unwrap();
    static ref LINE_COMMENT: Regex = Regex::new(r"(?m)^\s*//.*$").unwrap();
}

/// Pull the JSON object out of a model reply.
///
/// Prefers the first fenced code block, then the span from the first `{` to
/// the last `}`. Returns the trimmed text unchanged when neither applies.
pub fn extract_json(text: &str) -> &str {
    let text = match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(m) if m.as_str().contains('{') => m.as_str(),
        _ => text,
    };

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        (Some(start), _) => &text[start..],
        _ => text.trim(),
    }
}

/// First repair pass: typographic quotes, `//` comment lines, trailing commas.
fn fix_punctuation(text: &str) -> String {
    let text = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let text = LINE_COMMENT.replace_all(&text, "");
    TRAILING_COMMA.replace_all(&text, "$1").into_owned()
}

/// Second repair pass: close an unterminated string and any unclosed brackets.
fn close_delimiters(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = text.trim_end().to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    TRAILING_COMMA.replace_all(&repaired, "$1").into_owned()
}

const REPAIR_PASSES: &[fn(&str) -> String] = &[fix_punctuation, close_delimiters];

/// Parse model output as `T`, repairing at most `repair_attempts` times.
pub fn parse_with_repair<T: DeserializeOwned>(text: &str, repair_attempts: usize) -> Result<T, AiError> {
    let mut candidate = extract_json(text).to_string();
    let mut attempts = 1;

    let mut last_error = match serde_json::from_str::<T>(&candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    tracing::warn!("model output is not valid JSON, attempting repair: {}", last_error);

    for pass in REPAIR_PASSES.iter().take(repair_attempts) {
        candidate = pass(&candidate);
        attempts += 1;
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => {
                tracing::debug!(attempts, "repaired model output");
                return Ok(value);
            }
            Err(e) => last_error = e,
        }
    }

    Err(AiError::MalformedResponse {
        attempts,
        message: last_error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_extract_from_fence() {
        let text = "Here you go:\n```json\n{\"passed\": true}\n```\nThanks";
        assert_eq!(extract_json(text), "{\"passed\": true}");
    }

    #[test]
    fn test_extract_from_prose() {
        let text = "Sure! {\"a\": {\"b\": 1}} hope that helps";
        assert_eq!(extract_json(text), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn test_clean_json_needs_no_repair() {
        let v: Value = parse_with_repair("{\"x\": 1}", 0).unwrap();
        assert_eq!(v["x"], 1);
    }

    #[test]
    fn test_trailing_comma_repaired() {
        let text = "{\"results\": [1, 2,], \u{201c}ok\u{201d}: true,}";
        let v: Value = parse_with_repair(text, 1).unwrap();
        assert_eq!(v["results"][1], 2);
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn test_repair_disabled_fails() {
        let err = parse_with_repair::<Value>("{\"a\": 1,}", 0).unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse { attempts: 1, .. }));
    }

    #[test]
    fn test_truncated_output_needs_second_pass() {
        let text = "{\"results\": [{\"message\": \"cut off";
        assert!(parse_with_repair::<Value>(text, 1).is_err());

        let v: Value = parse_with_repair(text, 2).unwrap();
        assert_eq!(v["results"][0]["message"], "cut off");
    }

    #[test]
    fn test_hopeless_output() {
        let err = parse_with_repair::<Value>("I cannot help with that.", 5).unwrap_err();
        match err {
            AiError::MalformedResponse { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {}", other),
        }
    }
}
