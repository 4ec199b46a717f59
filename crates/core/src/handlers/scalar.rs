//! Fallback scalar handler: direct equality with numeric/string coercion.

use serde_json::Value;

/// Equality with coercion between numeric and numeric-string forms, so
/// `42`, `42.0`, and `"42"` all compare equal.
pub fn compare(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Coerce a scalar toward the target's declared type.
pub fn transform(value: &Value, tgt_type: &str) -> Option<Value> {
    if is_numeric_type(tgt_type) {
        return as_number(value).map(|n| {
            serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        });
    }
    if is_text_type(tgt_type) {
        return Some(match value {
            Value::String(_) => value.clone(),
            other => Value::String(value_to_plain_string(other)),
        });
    }
    Some(value.clone())
}

/// Numeric view of a value: numbers directly, strings via parse.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_numeric_type(tag: &str) -> bool {
    ["int", "serial", "numeric", "decimal", "float", "double", "real"]
        .iter()
        .any(|t| tag.contains(t))
}

fn is_text_type(tag: &str) -> bool {
    ["text", "char", "varchar", "string"].iter().any(|t| tag.contains(t))
}

/// String form without JSON quoting (numbers and booleans as typed).
fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_values_equal() {
        assert!(compare(&json!("abc"), &json!("abc")));
        assert!(compare(&json!(true), &json!(true)));
    }

    #[test]
    fn number_equals_numeric_string() {
        assert!(compare(&json!(42), &json!("42")));
        assert!(compare(&json!("3.5"), &json!(3.5)));
    }

    #[test]
    fn integer_equals_equivalent_float() {
        assert!(compare(&json!(42), &json!(42.0)));
    }

    #[test]
    fn different_numbers_differ() {
        assert!(!compare(&json!(42), &json!("43")));
    }

    #[test]
    fn non_numeric_string_vs_number_differs() {
        assert!(!compare(&json!("forty-two"), &json!(42)));
    }

    #[test]
    fn transform_string_to_numeric() {
        let v = transform(&json!("17"), "integer").unwrap();
        assert_eq!(v, json!(17.0));
    }

    #[test]
    fn transform_number_to_text() {
        let v = transform(&json!(17), "varchar").unwrap();
        assert_eq!(v, json!("17"));
    }

    #[test]
    fn transform_unparseable_to_numeric_is_null() {
        let v = transform(&json!("n/a"), "integer");
        assert_eq!(v, None);
    }
}
