//! Document reference handler.
//!
//! Two shapes are supported: an opaque path string, and a
//! `{path, metadata}` object. By default only `path` participates in
//! equality; `check_metadata` widens the comparison to the full object.

use serde_json::Value;

/// Type tags claimed by the document handler.
const TAGS: [&str; 4] = ["document", "document_ref", "file_ref", "attachment"];

pub fn can_handle(tag: &str) -> bool {
    TAGS.iter().any(|t| tag == *t)
}

/// Path component of a document reference, for either supported shape.
pub fn path_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("path").and_then(Value::as_str),
        _ => None,
    }
}

pub fn compare(a: &Value, b: &Value, check_metadata: bool) -> bool {
    if check_metadata {
        // Full-object equality, but a bare path string still matches an
        // object whose metadata is absent.
        if a == b {
            return true;
        }
        return match (a, b) {
            (Value::Object(ma), Value::Object(mb)) => ma == mb,
            _ => paths_equal(a, b) && metadata_of(a) == metadata_of(b),
        };
    }
    paths_equal(a, b)
}

fn paths_equal(a: &Value, b: &Value) -> bool {
    match (path_of(a), path_of(b)) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => {
            tracing::warn!("Unrecognized document reference shape; treating as differing");
            false
        }
    }
}

fn metadata_of(value: &Value) -> Option<&Value> {
    value.as_object().and_then(|m| m.get("metadata"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn claims_document_tags_only() {
        assert!(can_handle("document_ref"));
        assert!(can_handle("attachment"));
        assert!(!can_handle("text"));
    }

    #[test]
    fn path_string_equals_same_path_object() {
        let a = json!("/docs/deed-123.pdf");
        let b = json!({"path": "/docs/deed-123.pdf", "metadata": {"pages": 4}});
        assert!(compare(&a, &b, false));
    }

    #[test]
    fn different_paths_differ() {
        let a = json!({"path": "/docs/a.pdf"});
        let b = json!({"path": "/docs/b.pdf"});
        assert!(!compare(&a, &b, false));
    }

    #[test]
    fn metadata_ignored_by_default() {
        let a = json!({"path": "/docs/a.pdf", "metadata": {"pages": 4}});
        let b = json!({"path": "/docs/a.pdf", "metadata": {"pages": 9}});
        assert!(compare(&a, &b, false));
    }

    #[test]
    fn check_metadata_compares_full_object() {
        let a = json!({"path": "/docs/a.pdf", "metadata": {"pages": 4}});
        let b = json!({"path": "/docs/a.pdf", "metadata": {"pages": 9}});
        assert!(!compare(&a, &b, true));
    }

    #[test]
    fn unrecognized_shape_differs() {
        assert!(!compare(&json!(42), &json!(42), false));
    }
}
