//! Array column handler.
//!
//! Delegates element comparison to the element type's handler when one is
//! declared in the options; otherwise elements compare as scalars (or JSON
//! structures). Length mismatch always differs. Order-insensitive mode
//! sort-compares primitive arrays and uses a greedy matching pass for
//! arrays of objects.

use serde_json::Value;

use super::{CompareOptions, Registry, TypeHandler};

pub fn can_handle(tag: &str) -> bool {
    tag == "array" || tag.ends_with("[]") || tag.starts_with('_')
}

pub fn compare(a: &Value, b: &Value, opts: &CompareOptions) -> bool {
    let (Some(xs), Some(ys)) = (a.as_array(), b.as_array()) else {
        tracing::warn!("Non-array value in array comparison; treating as differing");
        return false;
    };
    if xs.len() != ys.len() {
        return false;
    }

    let element = element_handler(opts);
    // Element options must not recurse into array handling.
    let elem_opts = CompareOptions {
        element_type: None,
        ..opts.clone()
    };

    if !opts.ignore_order {
        return ordered_equal(xs, ys, element, &elem_opts);
    }

    let all_primitive = |vs: &[Value]| vs.iter().all(|v| !v.is_object() && !v.is_array());
    if all_primitive(xs) && all_primitive(ys) {
        // Sort-compare on canonical string forms, then verify pairwise with
        // the element handler so numeric coercion still applies.
        let mut sx: Vec<&Value> = xs.iter().collect();
        let mut sy: Vec<&Value> = ys.iter().collect();
        sx.sort_by_key(|v| v.to_string());
        sy.sort_by_key(|v| v.to_string());
        return sx
            .iter()
            .zip(&sy)
            .all(|(x, y)| element.compare(x, y, &elem_opts));
    }

    greedy_match(xs, ys, element, &elem_opts)
}

fn element_handler(opts: &CompareOptions) -> TypeHandler {
    match &opts.element_type {
        Some(tag) => Registry::default().resolve(tag),
        None => TypeHandler::Scalar,
    }
}

fn ordered_equal(
    xs: &[Value],
    ys: &[Value],
    element: TypeHandler,
    opts: &CompareOptions,
) -> bool {
    xs.iter().zip(ys).all(|(x, y)| {
        if x.is_object() || x.is_array() || y.is_object() || y.is_array() {
            TypeHandler::Json.compare(x, y, opts)
        } else {
            element.compare(x, y, opts)
        }
    })
}

/// For each left element, claim the first unclaimed equal right element.
fn greedy_match(
    xs: &[Value],
    ys: &[Value],
    element: TypeHandler,
    opts: &CompareOptions,
) -> bool {
    let mut claimed = vec![false; ys.len()];
    for x in xs {
        let found = ys.iter().enumerate().position(|(i, y)| {
            if claimed[i] {
                return false;
            }
            if x.is_object() || x.is_array() {
                TypeHandler::Json.compare(x, y, opts)
            } else {
                element.compare(x, y, opts)
            }
        });
        match found {
            Some(i) => claimed[i] = true,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> CompareOptions {
        CompareOptions::default()
    }

    #[test]
    fn claims_array_tags() {
        assert!(can_handle("array"));
        assert!(can_handle("text[]"));
        assert!(can_handle("_int4"));
        assert!(!can_handle("text"));
    }

    #[test]
    fn length_mismatch_differs() {
        assert!(!compare(&json!([1, 2]), &json!([1, 2, 3]), &opts()));
    }

    #[test]
    fn primitive_arrays_unordered_by_default() {
        assert!(compare(&json!([3, 1, 2]), &json!([1, 2, 3]), &opts()));
    }

    #[test]
    fn ordered_mode_respects_order() {
        let o = CompareOptions {
            ignore_order: false,
            ..opts()
        };
        assert!(!compare(&json!([3, 1, 2]), &json!([1, 2, 3]), &o));
        assert!(compare(&json!([1, 2, 3]), &json!([1, 2, 3]), &o));
    }

    #[test]
    fn numeric_coercion_applies_to_elements() {
        assert!(compare(&json!([1, 2]), &json!(["1", "2"]), &opts()));
    }

    #[test]
    fn object_arrays_greedy_match_when_unordered() {
        let a = json!([{"k": 1}, {"k": 2}]);
        let b = json!([{"k": 2}, {"k": 1}]);
        assert!(compare(&a, &b, &opts()));
    }

    #[test]
    fn greedy_match_does_not_double_claim() {
        let a = json!([{"k": 1}, {"k": 1}]);
        let b = json!([{"k": 1}, {"k": 2}]);
        assert!(!compare(&a, &b, &opts()));
    }

    #[test]
    fn element_type_delegates_to_declared_handler() {
        let o = CompareOptions {
            element_type: Some("timestamptz".to_string()),
            ..opts()
        };
        let a = json!(["2026-08-06T14:30:00Z"]);
        let b = json!(["2026-08-06 14:30:00"]);
        assert!(compare(&a, &b, &o));
    }

    #[test]
    fn non_array_differs() {
        assert!(!compare(&json!(1), &json!([1]), &opts()));
    }
}
