//! Tolerant lookups over untyped provider JSON.
//!
//! The provider's response schema drifts between API versions, so every lookup
//! takes a prioritized list of key paths and degrades to `None` instead of failing.

use serde_json::Value;

/// A key path into nested JSON objects, outermost key first.
pub type KeyPath<'a> = &'a [&'a str];

/// Walks `path` through nested objects. Non-object intermediates end the walk.
pub fn lookup<'v>(value: &'v Value, path: KeyPath<'_>) -> Option<&'v Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// Null, empty strings and empty arrays count as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// First present value among `paths`, in priority order.
pub fn first_present<'v>(value: &'v Value, paths: &[KeyPath<'_>]) -> Option<&'v Value> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|candidate| is_present(candidate))
}

/// Like [`first_present`], rendered as text. Numbers and booleans are stringified;
/// objects and arrays are skipped.
pub fn first_text(value: &Value, paths: &[KeyPath<'_>]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter(|candidate| is_present(candidate))
        .find_map(|candidate| match candidate {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
}

/// First non-empty array among `paths`.
pub fn first_array<'v>(value: &'v Value, paths: &[KeyPath<'_>]) -> &'v [Value] {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .filter_map(Value::as_array)
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
        .unwrap_or_default()
}
