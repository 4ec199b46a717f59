//! Data-quality rule evaluation, scoring, and alert conditions.
//!
//! - [`rules`] — rule/violation types and activation-time config checks.
//! - [`evaluator`] — pure per-row rule evaluation, no database access.
//! - [`score`] — severity-weighted table and overall scores plus the
//!   completeness / accuracy / consistency sub-scores.
//! - [`outlier`] — z-score and IQR detection over column distributions.
//! - [`expr`] — the sandboxed `custom_expression` grammar.
//! - [`alert`] — alert condition predicates over report summaries.

pub mod alert;
pub mod evaluator;
pub mod expr;
pub mod outlier;
pub mod rules;
pub mod score;

pub use evaluator::{evaluate_row, EvalContext};
pub use rules::{QualityRule, RuleType, RuleViolation};
pub use score::{SeverityCounts, TableScore};
