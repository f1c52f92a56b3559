//! JSON extraction from free-form LM text.
//!
//! Small local models wrap JSON in code fences or prose; extraction looks for
//! the object before schema validation runs.
use serde::Deserialize;
use serde_json::Value;

/// Find the first JSON object in an LM response that `accept` takes.
///
/// Tries the whole (fence-stripped) text first, then every embedded object
/// in order. Models often echo a format example before the real answer, so a
/// rejected candidate does not end the search.
pub fn find_json_object<T>(raw: &str, mut accept: impl FnMut(Value) -> Option<T>) -> Option<T> {
    let cleaned = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        if value.is_object() {
            if let Some(found) = accept(value) {
                return Some(found);
            }
        }
    }
    let found = embedded_objects(&cleaned).find_map(accept);
    found
}

pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Every `{` that starts a parseable JSON object, in text order.
fn embedded_objects(raw: &str) -> impl Iterator<Item = Value> + '_ {
    raw.char_indices()
        .filter(|(_, ch)| *ch == '{')
        .filter_map(move |(idx, _)| {
            let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
            Value::deserialize(&mut deserializer)
                .ok()
                .filter(Value::is_object)
        })
}
