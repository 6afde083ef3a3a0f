//! Heuristic JSON extraction fallback
//!
//! When a caller requested structured JSON from a provider that has no native
//! structured-output support, the response transform hands the free-text
//! output to [`extract_json`]. Recovery is best-effort: the function always
//! produces valid JSON, but makes no promise the result is semantically what
//! the model meant.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // ```json ... ``` or a bare ``` ... ``` block
        Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").expect("fence regex is valid")
    })
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "1. key - value", "- key: value", "* key - value"
        Regex::new(r"(?m)^\s*(?:\d+\.|[-*])\s+(.+?)\s*[-:]\s*(.+?)\s*$")
            .expect("list regex is valid")
    })
}

/// Extract the best-available JSON value from free text.
///
/// Tries, in fixed priority order, stopping at the first success:
/// 1. the first fenced code block whose contents parse as JSON;
/// 2. the first balanced `{...}` or `[...]` substring that parses as JSON;
/// 3. a numbered/bulleted `key - value` list, parsed into
///    `{"items": [{"key": .., "value": ..}, ..]}`;
/// 4. the entire original text wrapped verbatim as `{"text": ..}`.
///
/// Step 4 never fails, so this function is total.
pub fn extract_json(text: &str) -> Value {
    if let Some(value) = from_fenced_block(text) {
        return value;
    }
    if let Some(value) = from_embedded_json(text) {
        return value;
    }
    if let Some(value) = from_list(text) {
        return value;
    }
    json!({ "text": text })
}

/// Convenience: the extracted value serialized back to a JSON string
pub fn extract_json_string(text: &str) -> String {
    extract_json(text).to_string()
}

fn from_fenced_block(text: &str) -> Option<Value> {
    for capture in fence_re().captures_iter(text) {
        let body = capture.get(1)?.as_str().trim();
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return Some(value);
        }
    }
    None
}

fn from_embedded_json(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    for (start, &byte) in bytes.iter().enumerate() {
        let (open, close) = match byte {
            b'{' => (b'{', b'}'),
            b'[' => (b'[', b']'),
            _ => continue,
        };

        // Walk forward to the matching close bracket, ignoring brackets
        // inside string literals.
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &b) in bytes[start..].iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' if in_string => escaped = true,
                b'"' => in_string = !in_string,
                b if b == open && !in_string => depth += 1,
                b if b == close && !in_string => {
                    depth -= 1;
                    if depth == 0 {
                        let candidate = &text[start..start + offset + 1];
                        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                            return Some(value);
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn from_list(text: &str) -> Option<Value> {
    let items: Vec<Value> = list_item_re()
        .captures_iter(text)
        .map(|capture| {
            json!({
                "key": capture[1].trim(),
                "value": capture[2].trim(),
            })
        })
        .collect();

    if items.is_empty() {
        None
    } else {
        Some(json!({ "items": items }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json_block() {
        let text = "Here you go:\n```json\n{\"a\":1}\n```\nDone.";
        assert_eq!(extract_json(text), json!({"a": 1}));
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n[1, 2, 3]\n```";
        assert_eq!(extract_json(text), json!([1, 2, 3]));
    }

    #[test]
    fn test_invalid_fence_falls_through_to_embedded() {
        let text = "```\nnot json at all\n```\nbut later {\"b\": 2} appears";
        assert_eq!(extract_json(text), json!({"b": 2}));
    }

    #[test]
    fn test_embedded_object() {
        assert_eq!(extract_json("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(
            extract_json("The answer is {\"a\": {\"nested\": true}} ok"),
            json!({"a": {"nested": true}})
        );
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"prefix {"msg": "has a } brace", "n": 1} suffix"#;
        assert_eq!(
            extract_json(text),
            json!({"msg": "has a } brace", "n": 1})
        );
    }

    #[test]
    fn test_bulleted_list() {
        let value = extract_json("- x: 1\n- y: 2");
        let items = value["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({"key": "x", "value": "1"}));
        assert_eq!(items[1], json!({"key": "y", "value": "2"}));
    }

    #[test]
    fn test_numbered_list() {
        let value = extract_json("1. name - Alice\n2. role - admin");
        let items = value["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], json!({"key": "role", "value": "admin"}));
    }

    #[test]
    fn test_plain_text_wrapped() {
        assert_eq!(extract_json("plain text"), json!({"text": "plain text"}));
    }

    #[test]
    fn test_always_returns_parseable_json() {
        for input in ["", "no structure here", "{broken", "[1, 2", "``` ```"] {
            let out = extract_json_string(input);
            serde_json::from_str::<Value>(&out).expect("output must be valid JSON");
        }
    }
}
