//! JSON containment, with the semantics of MySQL's `JSON_CONTAINS`
//!
//! In-memory backends use this so metadata and value filters behave the same
//! way as they do against MySQL.

use serde_json::{Map, Value};

/// True if `candidate` is contained in `target`
///
/// - objects: every candidate key exists in target and its value is contained
/// - arrays: every candidate element is contained in some target element
/// - scalar in array: contained in some element
/// - scalars: equal
pub fn json_contains(target: &Value, candidate: &Value) -> bool {
    match (target, candidate) {
        (Value::Object(t), Value::Object(c)) => c
            .iter()
            .all(|(k, cv)| t.get(k).is_some_and(|tv| json_contains(tv, cv))),
        (Value::Array(t), Value::Array(c)) => c
            .iter()
            .all(|cv| t.iter().any(|tv| json_contains(tv, cv))),
        (Value::Array(t), c) => t.iter().any(|tv| json_contains(tv, c)),
        (t, c) => t == c,
    }
}

/// True if `filter` is empty or every entry is contained in `doc`
pub fn matches_filter(doc: &Map<String, Value>, filter: Option<&Map<String, Value>>) -> bool {
    match filter {
        None => true,
        Some(f) => f
            .iter()
            .all(|(k, v)| doc.get(k).is_some_and(|dv| json_contains(dv, v))),
    }
}
