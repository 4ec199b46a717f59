//! Per-column-type value handlers and the registry that resolves them.
//!
//! A handler converts between on-wire row values and in-memory canonical
//! values, and answers "do these two values differ semantically?". Handlers
//! are a sum type resolved from a column's declared type tag by first match
//! in a fixed order; there is no dynamic registration beyond startup.
//!
//! Failure semantics: `extract`/`prepare` return `None` for values they
//! cannot process, and comparisons treat unparseable pairs as differing.
//! Both emit a warning log; neither ever aborts the job.

pub mod array;
pub mod datetime;
pub mod document;
pub mod geometry;
pub mod json;
pub mod scalar;

use serde_json::Value;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Precision at which two datetimes are considered equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatetimePrecision {
    Day,
    Hour,
    Minute,
    Second,
    Microsecond,
}

/// Tuning knobs for comparison and transformation.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Decimal places at which geometry coordinates are considered equal.
    pub coordinate_precision: u32,
    /// Equality granularity for datetime values.
    pub datetime_precision: DatetimePrecision,
    /// Compare arrays of primitives order-insensitively.
    pub ignore_order: bool,
    /// Compare the full document-reference object rather than just `path`.
    pub check_metadata: bool,
    /// Declared type of array elements, when known from configuration.
    pub element_type: Option<String>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            coordinate_precision: 6,
            datetime_precision: DatetimePrecision::Second,
            ignore_order: true,
            check_metadata: false,
            element_type: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TypeHandler
// ---------------------------------------------------------------------------

/// The handler kinds, in registry resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHandler {
    Geometric,
    Document,
    Json,
    DateTime,
    Array,
    Scalar,
}

impl TypeHandler {
    /// Whether this handler claims the declared column type tag.
    ///
    /// Matching is a case-insensitive substring/suffix check over the tag,
    /// so both logical tags (`"geometry"`) and driver-level names
    /// (`"timestamp with time zone"`, `"text[]"`) resolve.
    pub fn can_handle(self, declared_type: &str) -> bool {
        let tag = declared_type.to_ascii_lowercase();
        match self {
            Self::Geometric => geometry::can_handle(&tag),
            Self::Document => document::can_handle(&tag),
            Self::Json => json::can_handle(&tag),
            Self::DateTime => datetime::can_handle(&tag),
            Self::Array => array::can_handle(&tag),
            Self::Scalar => true,
        }
    }

    /// Normalize a raw driver value into canonical form.
    ///
    /// Returns `None` (with a warning log) for values the handler cannot
    /// make sense of; the caller records a `type_mismatch` and skips the row.
    pub fn extract(self, column: &str, raw: &Value) -> Option<Value> {
        if raw.is_null() {
            return Some(Value::Null);
        }
        let extracted = match self {
            Self::Geometric => geometry::extract(raw),
            Self::Json => json::extract(raw),
            Self::DateTime => datetime::extract(raw),
            Self::Document | Self::Array | Self::Scalar => Some(raw.clone()),
        };
        if extracted.is_none() {
            tracing::warn!(column, handler = ?self, "Failed to extract value");
        }
        extracted
    }

    /// Materialize a canonical value for the target driver.
    pub fn prepare(self, column: &str, value: &Value) -> Option<Value> {
        // Canonical forms are already driver-compatible JSON; preparation
        // re-runs extraction so half-normalized inputs round-trip.
        self.extract(column, value)
    }

    /// Semantic equivalence. Null equals null; null never equals non-null.
    pub fn compare(self, a: &Value, b: &Value, opts: &CompareOptions) -> bool {
        match (a.is_null(), b.is_null()) {
            (true, true) => return true,
            (true, false) | (false, true) => return false,
            (false, false) => {}
        }
        match self {
            Self::Geometric => geometry::compare(a, b, opts.coordinate_precision),
            Self::Document => document::compare(a, b, opts.check_metadata),
            Self::Json => json::compare(a, b, opts.ignore_order),
            Self::DateTime => datetime::compare(a, b, opts.datetime_precision),
            Self::Array => array::compare(a, b, opts),
            Self::Scalar => scalar::compare(a, b),
        }
    }

    /// Negation of [`compare`](Self::compare) with the same tolerances.
    pub fn differ(self, a: &Value, b: &Value, opts: &CompareOptions) -> bool {
        !self.compare(a, b, opts)
    }

    /// Cross-type coercion between declared source and target types.
    ///
    /// Returns `None` when no sensible conversion exists.
    pub fn transform(
        self,
        value: &Value,
        src_type: &str,
        tgt_type: &str,
        opts: &CompareOptions,
    ) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        let src = src_type.to_ascii_lowercase();
        let tgt = tgt_type.to_ascii_lowercase();
        match self {
            Self::Geometric => geometry::transform(value, &tgt),
            Self::Json => json::transform(value, &tgt),
            Self::DateTime => datetime::transform(value, opts.datetime_precision),
            Self::Scalar => scalar::transform(value, &tgt),
            Self::Document | Self::Array => {
                if src == tgt {
                    Some(value.clone())
                } else {
                    None
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Resolves a declared column type tag to a handler.
///
/// Resolution order is fixed: Geometric -> Document -> JSON -> DateTime ->
/// Array -> Scalar. The first handler whose `can_handle` returns true wins;
/// Scalar accepts everything, so resolution always succeeds.
#[derive(Debug, Clone)]
pub struct Registry {
    handlers: Vec<TypeHandler>,
}

impl Registry {
    /// Resolve the handler for a declared type tag.
    pub fn resolve(&self, declared_type: &str) -> TypeHandler {
        self.handlers
            .iter()
            .copied()
            .find(|h| h.can_handle(declared_type))
            .unwrap_or(TypeHandler::Scalar)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            handlers: vec![
                TypeHandler::Geometric,
                TypeHandler::Document,
                TypeHandler::Json,
                TypeHandler::DateTime,
                TypeHandler::Array,
                TypeHandler::Scalar,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolution_order_is_fixed() {
        let reg = Registry::default();
        assert_eq!(reg.resolve("geometry"), TypeHandler::Geometric);
        assert_eq!(reg.resolve("document_ref"), TypeHandler::Document);
        assert_eq!(reg.resolve("jsonb"), TypeHandler::Json);
        assert_eq!(reg.resolve("timestamptz"), TypeHandler::DateTime);
        assert_eq!(reg.resolve("text[]"), TypeHandler::Array);
        assert_eq!(reg.resolve("integer"), TypeHandler::Scalar);
    }

    #[test]
    fn unknown_tag_falls_back_to_scalar() {
        let reg = Registry::default();
        assert_eq!(reg.resolve("money"), TypeHandler::Scalar);
    }

    #[test]
    fn null_equals_null_for_every_handler() {
        let opts = CompareOptions::default();
        for h in [
            TypeHandler::Geometric,
            TypeHandler::Document,
            TypeHandler::Json,
            TypeHandler::DateTime,
            TypeHandler::Array,
            TypeHandler::Scalar,
        ] {
            assert!(h.compare(&Value::Null, &Value::Null, &opts));
            assert!(h.differ(&Value::Null, &json!(1), &opts));
        }
    }

    #[test]
    fn extract_passes_null_through() {
        let v = TypeHandler::Geometric.extract("geom", &Value::Null);
        assert_eq!(v, Some(Value::Null));
    }

    #[test]
    fn differ_negates_compare() {
        let opts = CompareOptions::default();
        assert!(!TypeHandler::Scalar.differ(&json!(5), &json!(5), &opts));
        assert!(TypeHandler::Scalar.differ(&json!(5), &json!(6), &opts));
    }

    #[test]
    fn prepare_reruns_normalization() {
        let half_normalized = json!("POINT (1 2)");
        let prepared = TypeHandler::Geometric.prepare("boundary", &half_normalized).unwrap();
        assert_eq!(prepared["type"], "Point");
    }

    #[test]
    fn transform_dispatches_cross_type_coercions() {
        let opts = CompareOptions::default();
        let wkt = TypeHandler::Geometric
            .transform(&json!({"type": "Point", "coordinates": [1.0, 2.0]}), "geometry", "wkt", &opts)
            .unwrap();
        assert_eq!(wkt, json!("POINT (1 2)"));

        let text = TypeHandler::Scalar
            .transform(&json!(42), "integer", "text", &opts)
            .unwrap();
        assert_eq!(text, json!("42"));

        assert_eq!(
            TypeHandler::Json.transform(&Value::Null, "jsonb", "text", &opts),
            Some(Value::Null)
        );
    }
}
