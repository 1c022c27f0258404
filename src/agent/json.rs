//! Lenient extraction of JSON from model replies.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or (for reasoning
//! models) hide it inside `<think>` blocks. Every agent funnels its reply
//! through [`extract_json`] before deserializing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static THINK_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").ok());

static OPEN_THINK: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<think>(.*)").ok());

/// Removes reasoning blocks from a reply.
///
/// When nothing is left outside the blocks, returns the content of the
/// first block instead so that JSON emitted while "thinking" is salvaged.
#[must_use]
pub fn strip_think(content: &str) -> String {
    let (Some(closed), Some(open)) = (THINK_BLOCK.as_ref(), OPEN_THINK.as_ref()) else {
        return content.trim().to_string();
    };

    let outside = closed.replace_all(content, "");
    let outside = open.replace_all(&outside, "");
    let outside = outside.trim();
    if !outside.is_empty() {
        return outside.to_string();
    }

    closed
        .captures(content)
        .or_else(|| open.captures(content))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Strips a surrounding markdown code fence.
#[must_use]
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

/// Parses the JSON value carried by a model reply.
///
/// Tries the cleaned reply as a whole first. Failing that, tries the
/// outermost `[...]` and `{...}` spans, whichever opens first.
#[must_use]
pub fn extract_json(content: &str) -> Option<Value> {
    let cleaned = strip_think(content);
    let candidate = strip_code_fence(&cleaned);

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    let mut spans: Vec<(usize, usize)> = [('[', ']'), ('{', '}')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = candidate.find(open)?;
            let end = candidate.rfind(close)?;
            (end > start).then_some((start, end))
        })
        .collect();
    spans.sort_unstable();

    spans
        .into_iter()
        .find_map(|(start, end)| serde_json::from_str::<Value>(&candidate[start..=end]).ok())
}

/// Returns the array carried by a reply: a bare array, or the first of
/// `keys` that holds an array inside an object.
#[must_use]
pub fn extract_array(content: &str, keys: &[&str]) -> Option<Vec<Value>> {
    match extract_json(content)? {
        Value::Array(items) => Some(items),
        Value::Object(map) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array).cloned()),
        _ => None,
    }
}

/// Truncates to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("[1, 2]" ; "bare array")]
    #[test_case("```json\n[1, 2]\n```" ; "fenced")]
    #[test_case("Here you go:\n[1, 2]\nHope this helps" ; "chatter")]
    #[test_case("<think>let me see</think>\n[1, 2]" ; "after think")]
    #[test_case("<think>the answer is [1, 2]</think>" ; "inside think")]
    #[test_case("<think>unterminated [1, 2]" ; "inside open think")]
    fn test_extract_json_array(input: &str) {
        assert_eq!(extract_json(input), Some(serde_json::json!([1, 2])));
    }

    #[test]
    fn test_extract_json_object() {
        let value = extract_json(r#"Sure! {"sufficient": true}"#);
        assert_eq!(value, Some(serde_json::json!({"sufficient": true})));
    }

    #[test]
    fn test_extract_json_object_holding_array() {
        let value = extract_json(r#"Analysis: {"suggested_queries": ["a", "b"]} done"#);
        assert_eq!(value, Some(serde_json::json!({"suggested_queries": ["a", "b"]})));
    }

    #[test]
    fn test_extract_json_garbage() {
        assert_eq!(extract_json("definitely not json"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn test_extract_array_from_wrapper() {
        let items = extract_array(r#"{"tasks": [{"query": "a"}]}"#, &["tasks"]);
        assert_eq!(items.map(|v| v.len()), Some(1));
        assert!(extract_array(r#"{"other": []}"#, &["tasks"]).is_none());
    }

    #[test]
    fn test_strip_think_keeps_outside_text() {
        assert_eq!(strip_think("<think>hmm</think> answer"), "answer");
        assert_eq!(strip_think("plain"), "plain");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
