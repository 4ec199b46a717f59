//! JSON column handler.
//!
//! Comparison canonicalizes objects by key order. Arrays of primitives may
//! be compared order-insensitively (the default); arrays of objects fall
//! back to ordered compare.

use serde_json::Value;

pub fn can_handle(tag: &str) -> bool {
    tag == "json" || tag == "jsonb"
}

/// Parse string payloads into structured values; pass structures through.
pub fn extract(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

/// Structural equality after canonicalization.
pub fn compare(a: &Value, b: &Value, ignore_order: bool) -> bool {
    let (Some(ca), Some(cb)) = (extract(a), extract(b)) else {
        tracing::warn!("Unparseable JSON value; treating as differing");
        return false;
    };
    values_equal(&ca, &cb, ignore_order)
}

/// Coerce between string and structured representations.
pub fn transform(value: &Value, tgt_type: &str) -> Option<Value> {
    let structured = extract(value)?;
    if tgt_type.contains("text") || tgt_type.contains("char") || tgt_type.contains("string") {
        Some(Value::String(structured.to_string()))
    } else {
        Some(structured)
    }
}

fn values_equal(a: &Value, b: &Value, ignore_order: bool) -> bool {
    match (a, b) {
        // serde_json maps are key-ordered comparisons already; recurse so
        // nested arrays honor ignore_order.
        (Value::Object(ma), Value::Object(mb)) => {
            ma.len() == mb.len()
                && ma.iter().all(|(k, va)| {
                    mb.get(k).is_some_and(|vb| values_equal(va, vb, ignore_order))
                })
        }
        (Value::Array(xs), Value::Array(ys)) => arrays_equal(xs, ys, ignore_order),
        _ => a == b,
    }
}

fn arrays_equal(xs: &[Value], ys: &[Value], ignore_order: bool) -> bool {
    if xs.len() != ys.len() {
        return false;
    }
    let all_primitive =
        |vs: &[Value]| vs.iter().all(|v| !v.is_object() && !v.is_array());
    if ignore_order && all_primitive(xs) && all_primitive(ys) {
        let mut sx: Vec<String> = xs.iter().map(canonical_string).collect();
        let mut sy: Vec<String> = ys.iter().map(canonical_string).collect();
        sx.sort();
        sy.sort();
        return sx == sy;
    }
    // Arrays of objects (or mixed): ordered compare.
    xs.iter()
        .zip(ys)
        .all(|(x, y)| values_equal(x, y, ignore_order))
}

/// Stable string form used for order-insensitive primitive comparison.
fn canonical_string(value: &Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_json_tags() {
        assert!(can_handle("jsonb"));
        assert!(!can_handle("jsonlike"));
    }

    #[test]
    fn string_payload_parsed_before_compare() {
        let a = json!(r#"{"zoning":"R1","acres":2.5}"#);
        let b = json!({"acres": 2.5, "zoning": "R1"});
        assert!(compare(&a, &b, true));
    }

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert!(compare(&a, &b, true));
    }

    #[test]
    fn primitive_arrays_unordered_by_default() {
        let a = json!([3, 1, 2]);
        let b = json!([1, 2, 3]);
        assert!(compare(&a, &b, true));
        assert!(!compare(&a, &b, false));
    }

    #[test]
    fn object_arrays_stay_ordered() {
        let a = json!([{"k": 1}, {"k": 2}]);
        let b = json!([{"k": 2}, {"k": 1}]);
        assert!(!compare(&a, &b, true));
    }

    #[test]
    fn nested_objects_compared_recursively() {
        let a = json!({"outer": {"x": 1, "y": [2, 1]}});
        let b = json!({"outer": {"y": [1, 2], "x": 1}});
        assert!(compare(&a, &b, true));
    }

    #[test]
    fn length_mismatch_differs() {
        assert!(!compare(&json!([1, 2]), &json!([1, 2, 3]), true));
    }

    #[test]
    fn malformed_string_differs() {
        assert!(!compare(&json!("{not json"), &json!({}), true));
    }

    #[test]
    fn transform_to_text_serializes() {
        let v = transform(&json!({"a": 1}), "text").unwrap();
        assert_eq!(v, json!(r#"{"a":1}"#));
    }

    #[test]
    fn transform_string_to_structured() {
        let v = transform(&json!(r#"[1,2]"#), "jsonb").unwrap();
        assert_eq!(v, json!([1, 2]));
    }
}
