use crate::event::Headers;
use crate::har::NameValuePair;
use serde_json::Value;

/// Flatten a DevTools header map into HAR name/value pairs.
///
/// List values yield one pair per element in order. Chrome folds repeated
/// headers (e.g. `Set-Cookie`) into a single newline separated string, those
/// are split the same way. Non-string scalars are rendered as JSON text.
pub fn normalize_headers(headers: &Headers) -> Vec<NameValuePair> {
    let mut pairs = Vec::with_capacity(headers.len());
    for (name, value) in headers {
        match value {
            Value::Array(values) => {
                for value in values {
                    push_value(&mut pairs, name, value);
                }
            }
            other => push_value(&mut pairs, name, other),
        }
    }
    pairs
}

fn push_value(pairs: &mut Vec<NameValuePair>, name: &str, value: &Value) {
    match value {
        Value::String(text) => {
            for line in text.split('\n') {
                pairs.push(NameValuePair::new(name, line));
            }
        }
        Value::Null => pairs.push(NameValuePair::new(name, "")),
        other => pairs.push(NameValuePair::new(name, other.to_string())),
    }
}
