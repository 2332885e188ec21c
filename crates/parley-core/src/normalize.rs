//! Text extraction from agent response JSON.
//!
//! The agent backend wraps model output in a variety of envelopes (plain
//! strings, `content.parts` lists, Gemini-style `candidates`, `delta` chunks,
//! arrays of events) and may add new ones over time. [`extract_text`] applies
//! a fixed list of shape rules and, failing all of them, collects any textual
//! field it can find, so unknown envelopes degrade to "some text" rather than
//! an error.

use serde_json::{Map, Value};

/// Extract the display text from an agent response or stream event.
///
/// Rules are checked top-down; the first one that matches wins:
///
/// 1. a string is returned as-is
/// 2. an array concatenates the text of every element
/// 3. a non-empty string `text` field
/// 4. a non-empty string `content` field
/// 5. `delta.text`, `message.text` or `chunk.text`, in that order
/// 6. `content.parts`: string parts, else each part's `text` or `content`
/// 7. `parts`, same as above
/// 8. `candidates`, each via its `content.parts` or recursively
/// 9. an object or array `content` is recursed into
/// 10. a `message` is recursed into
/// 11. every string `text`/`content` found anywhere below the value
///
/// Never fails: `null`, numbers, booleans and empty containers yield `""`.
#[must_use]
pub fn extract_text(value: &Value) -> String {
    let obj = match value {
        Value::String(s) => return s.clone(),
        Value::Array(items) => return items.iter().map(extract_text).collect(),
        Value::Object(obj) => obj,
        Value::Null | Value::Bool(_) | Value::Number(_) => return String::new(),
    };

    if let Some(text) = non_empty_str(obj.get("text")) {
        return text.to_string();
    }
    if let Some(content) = non_empty_str(obj.get("content")) {
        return content.to_string();
    }

    for wrapper in ["delta", "message", "chunk"] {
        let nested = obj.get(wrapper).and_then(Value::as_object);
        if let Some(text) = nested.and_then(|w| non_empty_str(w.get("text"))) {
            return text.to_string();
        }
    }

    if let Some(parts) = obj
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
    {
        return join_parts(parts);
    }
    if let Some(parts) = obj.get("parts").and_then(Value::as_array) {
        return join_parts(parts);
    }

    if let Some(candidates) = obj.get("candidates").and_then(Value::as_array) {
        return candidates.iter().map(candidate_text).collect();
    }

    if let Some(content @ (Value::Object(_) | Value::Array(_))) = obj.get("content") {
        return extract_text(content);
    }
    if let Some(message) = obj.get("message").filter(|m| is_truthy(m)) {
        return extract_text(message);
    }

    let mut out = String::new();
    collect_nested(obj, &mut out);
    out
}

/// Join a `parts` list: strings as-is, otherwise a part's `text` or `content`.
fn join_parts(parts: &[Value]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            Value::String(s) => Some(s.as_str()),
            Value::Object(p) => non_empty_str(p.get("text")).or_else(|| non_empty_str(p.get("content"))),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn candidate_text(candidate: &Value) -> String {
    match candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
    {
        Some(parts) => join_parts(parts),
        None => extract_text(candidate),
    }
}

/// Depth-first walk over an object's fields (in document order) collecting
/// string `text`/`content` values. Strings that are array elements are kept too.
///
/// Scalar `text`/`content` fields are consumed by [`collect_node`]; only
/// container-valued fields are descended into, whatever their key.
fn collect_nested(obj: &Map<String, Value>, out: &mut String) {
    for value in obj.values() {
        match value {
            Value::Array(items) => items.iter().for_each(|item| collect_node(item, out)),
            Value::Object(_) => collect_node(value, out),
            _ => {}
        }
    }
}

fn collect_node(node: &Value, out: &mut String) {
    match node {
        Value::String(s) => out.push_str(s),
        Value::Object(obj) => {
            if let Some(text) = non_empty_str(obj.get("text")) {
                out.push_str(text);
            }
            if let Some(content) = non_empty_str(obj.get("content")) {
                out.push_str(content);
            }
            collect_nested(obj, out);
        }
        _ => {}
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Loose truthiness for wrapper fields: empty strings, `false`, zero and null
/// do not count as present.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
