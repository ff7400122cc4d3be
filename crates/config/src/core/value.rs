//! Helpers over the merged `serde_json::Value` tree.
//!
//! Keys are colon-separated paths (`ConnectionStrings:db`). Segment matching
//! is ASCII case-insensitive, the way hierarchical host configuration
//! behaves.

use serde_json::{Map, Value};

/// Path segment separator.
pub const SEPARATOR: char = ':';

/// Look up `path` in `root`, matching segments case-insensitively.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split(SEPARATOR).try_fold(root, |node, segment| match node {
        Value::Object(map) => find_key(map, segment).and_then(|key| map.get(key)),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Insert `value` at `path`, creating intermediate objects and replacing
/// scalars that stand in the way.
pub fn insert_path(root: &mut Value, path: &str, value: Value) {
    let mut node = root;
    let mut segments = path.split(SEPARATOR).peekable();
    while let Some(segment) = segments.next() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        let key = find_key(map, segment).map_or_else(|| segment.to_string(), str::to_string);
        if segments.peek().is_none() {
            map.insert(key, value);
            return;
        }
        node = map.entry(key).or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else
/// in `overlay` replaces what `base` had.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let key = find_key(base_map, &key).map_or(key.clone(), str::to_string);
                match base_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Render a scalar as the string a secret lookup returns.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Turn string scalars that look like booleans or numbers into typed values.
///
/// Environment variables only carry strings; typed sections read from them
/// need this second chance.
pub fn coerce_scalars(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if let Ok(b) = s.parse::<bool>() {
                Value::Bool(b)
            } else if let Ok(n) = s.parse::<i64>() {
                Value::from(n)
            } else if let Ok(n) = s.parse::<u64>() {
                Value::from(n)
            } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(s)
            }
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, coerce_scalars(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(coerce_scalars).collect()),
        other => other,
    }
}

fn find_key<'a>(map: &'a Map<String, Value>, segment: &str) -> Option<&'a str> {
    if map.contains_key(segment) {
        return map.get_key_value(segment).map(|(k, _)| k.as_str());
    }
    map.keys()
        .find(|k| k.eq_ignore_ascii_case(segment))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn get_path_is_case_insensitive() {
        let root = json!({"ConnectionStrings": {"db": "Server=."}});
        assert_eq!(
            get_path(&root, "connectionstrings:DB"),
            Some(&json!("Server=."))
        );
        assert_eq!(get_path(&root, "ConnectionStrings:cache"), None);
    }

    #[test]
    fn insert_path_builds_nested_objects() {
        let mut root = json!({});
        insert_path(&mut root, "Parameters:db-password", json!("hunter2"));
        insert_path(&mut root, "parameters:api-key", json!("abc"));
        assert_eq!(
            root,
            json!({"Parameters": {"db-password": "hunter2", "api-key": "abc"}})
        );
    }

    #[test]
    fn insert_path_replaces_scalar_parent() {
        let mut root = json!({"a": 1});
        insert_path(&mut root, "a:b", json!(2));
        assert_eq!(root, json!({"a": {"b": 2}}));
    }

    #[test]
    fn merge_overlays_leaves() {
        let mut base = json!({"Orchestrator": {"FailFast": false, "Probe": {"Period": 10}}});
        merge(
            &mut base,
            json!({"orchestrator": {"failfast": true}, "Extra": 1}),
        );
        assert_eq!(
            base,
            json!({"Orchestrator": {"FailFast": true, "Probe": {"Period": 10}}, "Extra": 1})
        );
    }

    #[test]
    fn coerce_scalars_types_strings() {
        let coerced = coerce_scalars(json!({"a": "true", "b": "42", "c": "1.5", "d": "text"}));
        assert_eq!(coerced, json!({"a": true, "b": 42, "c": 1.5, "d": "text"}));
    }

    #[test]
    fn scalar_to_string_renders_numbers() {
        assert_eq!(scalar_to_string(&json!(5432)).as_deref(), Some("5432"));
        assert_eq!(scalar_to_string(&json!({"x": 1})), None);
    }
}
