//! Dot-path access into JSON values
//!
//! Supports:
//! - `a.b.c` (object fields)
//! - `items.0.name` (numeric segment indexes arrays, or matches a `"0"` key on objects)
//!
//! Lookups never fail: any missing or non-traversable step yields `None`.

use serde_json::Value;

/// Walk `path` from `value`
///
/// Examples:
/// - `"user.name"` on `{"user": {"name": "Ann"}}` → `Some("Ann")`
/// - `"a.b"` on `{}` → `None`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, step)
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_fields() {
        let data = json!({"user": {"name": "Ann", "tags": ["x", "y"]}});
        assert_eq!(lookup(&data, "user.name"), Some(&json!("Ann")));
        assert_eq!(lookup(&data, "user.tags.1"), Some(&json!("y")));
    }

    #[test]
    fn numeric_key_on_object() {
        let data = json!({"0": "zero"});
        assert_eq!(lookup(&data, "0"), Some(&json!("zero")));
    }

    #[test]
    fn missing_steps_short_circuit() {
        let data = json!({"a": {"b": null}, "s": "text"});
        assert_eq!(lookup(&data, "missing.deep.path"), None);
        assert_eq!(lookup(&data, "a.b.c"), None);
        assert_eq!(lookup(&data, "s.length"), None);
        assert_eq!(lookup(&data, "a..b"), None);
        assert_eq!(lookup(&data, "a.b"), Some(&Value::Null));
    }

    #[test]
    fn out_of_range_index() {
        let data = json!({"items": [1]});
        assert_eq!(lookup(&data, "items.3"), None);
        assert_eq!(lookup(&data, "items.first"), None);
    }
}
