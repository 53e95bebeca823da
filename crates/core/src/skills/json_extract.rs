//! # JSON Extractor
//!
//! Pulls the first balanced `{...}` block out of noisy model output.
//! Every structured role output (audit reports, route decisions, admission
//! verdicts, archive commands) goes through [`extract_json`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Byte range of the first top-level object, found by brace counting.
///
/// Braces inside JSON strings are counted too, so an object whose string
/// values contain unbalanced braces is cut short and fails to parse.
fn find_json_bounds(text: &str) -> Option<(usize, usize)> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, start + i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

/// Extract the first complete JSON object embedded in `text`.
///
/// Returns an empty map when there is no `{`, the braces never balance, or
/// the candidate does not parse as an object. Never panics.
pub fn extract_json(text: &str) -> Map<String, Value> {
    let Some((start, end)) = find_json_bounds(text) else {
        return Map::new();
    };

    match serde_json::from_str::<Value>(&text[start..end]) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse embedded JSON object");
            Map::new()
        }
    }
}

/// Extract the first JSON object and deserialize it into `T`.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    let map = extract_json(text);
    if map.is_empty() {
        return None;
    }
    serde_json::from_value(Value::Object(map)).ok()
}
