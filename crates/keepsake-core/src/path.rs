// ABOUTME: Dot-separated path helpers for reading and writing slices of the JSON state tree.
// ABOUTME: set_value builds missing intermediate objects; merge_shallow overwrites top-level fields.

use serde_json::{Map, Value};

/// Look up the value at a dot-separated path such as `"user.profile.name"`.
/// Returns None if any segment is missing or traverses a non-object.
pub fn get_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |current, segment| current.as_object()?.get(segment))
}

/// Write `value` at a dot-separated path, creating intermediate objects as
/// needed. Any non-object found along the way is replaced by an object.
pub fn set_value(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return;
        };

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }

        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Copy the top-level fields of `patch` over `target`. A non-object patch is
/// ignored; a non-object target becomes an empty object first.
pub fn merge_shallow(target: &mut Value, patch: Value) {
    let Value::Object(fields) = patch else {
        tracing::debug!("ignoring non-object patch in shallow merge");
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        map.extend(fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_value_walks_nested_objects() {
        let state = json!({"user": {"profile": {"name": "ada"}}, "count": 3});
        assert_eq!(get_value(&state, "count"), Some(&json!(3)));
        assert_eq!(get_value(&state, "user.profile.name"), Some(&json!("ada")));
        assert_eq!(get_value(&state, "user.missing"), None);
        assert_eq!(get_value(&state, "count.deeper"), None);
    }

    #[test]
    fn set_value_creates_intermediate_objects() {
        let mut state = json!({});
        set_value(&mut state, "a.b.c", json!(1));
        assert_eq!(state, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn set_value_replaces_existing_leaf_and_keeps_siblings() {
        let mut state = json!({"a": {"b": 1, "keep": true}});
        set_value(&mut state, "a.b", json!({"x": 2}));
        assert_eq!(state, json!({"a": {"b": {"x": 2}, "keep": true}}));
    }

    #[test]
    fn set_value_overwrites_scalar_in_the_way() {
        let mut state = json!({"a": 5});
        set_value(&mut state, "a.b", json!("v"));
        assert_eq!(state, json!({"a": {"b": "v"}}));
    }

    #[test]
    fn merge_shallow_overwrites_top_level_only() {
        let mut state = json!({"counter": {"count": 0, "step": 1}, "other": 1});
        merge_shallow(&mut state, json!({"counter": {"count": 100}}));
        assert_eq!(state, json!({"counter": {"count": 100}, "other": 1}));
    }

    #[test]
    fn merge_shallow_ignores_non_object_patch() {
        let mut state = json!({"a": 1});
        merge_shallow(&mut state, json!([1, 2]));
        assert_eq!(state, json!({"a": 1}));
    }
}
