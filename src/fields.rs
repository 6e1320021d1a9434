//! Named-fields documents.
//!
//! A transformation renders a resource as one JSON object mapping field
//! names to values. Values are strings, numbers, booleans, or arrays of
//! those (multi-valued fields).

use repo_indexer_core::error::BackendError;
use serde_json::{Map, Value};

/// Parse transformation output into a field map.
pub fn parse_fields(resource_id: &str, content: &[u8]) -> Result<Map<String, Value>, BackendError> {
    let value: Value = serde_json::from_slice(content).map_err(|e| BackendError::Parse {
        resource_id: resource_id.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Parse {
            resource_id: resource_id.to_string(),
            reason: format!("expected a JSON object of named fields, got {}", kind_of(&other)),
        }),
    }
}

/// Searchable text of a field map: every non-empty scalar value, one per
/// line.
pub fn flatten_text(fields: &Map<String, Value>) -> String {
    let mut lines = Vec::new();
    for value in fields.values() {
        push_scalars(value, &mut lines);
    }
    lines.join("\n")
}

fn push_scalars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => items.iter().for_each(|v| push_scalars(v, out)),
        _ => {}
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_non_object() {
        let err = parse_fields("obj1", b"[1,2]").unwrap_err();
        match err {
            BackendError::Parse { resource_id, reason } => {
                assert_eq!(resource_id, "obj1");
                assert!(reason.contains("an array"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            parse_fields("obj1", b"dc:title=foo"),
            Err(BackendError::Parse { .. })
        ));
    }

    #[test]
    fn test_flatten_collects_scalars() {
        let fields = parse_fields(
            "obj1",
            br#"{"dc.title":"Meals","dc.subject":["cooking","microwave"],"pages":500,"draft":false,"empty":""}"#,
        )
        .unwrap();
        let mut lines: Vec<_> = flatten_text(&fields).lines().map(str::to_string).collect();
        lines.sort();
        assert_eq!(lines, vec!["500", "Meals", "cooking", "false", "microwave"]);
    }
}
