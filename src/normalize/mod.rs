//! Normalization of one run's raw metric payload into a flat tabular record
//!
//! This module transforms a run's metric samples into a single flat record
//! suitable for CSV or warehouse storage. The pipeline runs entirely in
//! memory over one already-materialized payload:
//!
//! 1. [`grouper`] collapses same-label samples per metric, applying the
//!    halving accumulator.
//! 2. [`tree`] reshapes the groups into a label-ordered nested tree.
//! 3. [`flatten`] collapses the tree into dot-joined flat fields.
//! 4. [`merge`] folds run metadata into the record.
//! 5. [`filters`] applies the default-deny gate and the extract allowlist.
//! 6. [`reduce`] collapses field families into aggregated fields.
//! 7. [`health`] derives the categorical cluster health score.
//!
//! Nothing here performs I/O or persists state; every invocation owns its
//! accumulators, so independent runs can be normalized concurrently. Sample
//! order is significant throughout: the halving accumulator is neither
//! associative nor commutative.

mod filters;
mod flatten;
mod grouper;
mod health;
mod labels;
mod merge;
mod patterns;
mod reduce;
mod tree;

pub use filters::{DataFilter, ExtractFilter, apply_extract_filters, passes_data_filters};
pub use flatten::{FlatRecord, flatten_tree, flatten_value};
pub use grouper::{GroupRecord, GroupValue, GroupedMetrics, MetricSample, group_samples};
pub use health::{Alert, HealthScore};
pub use labels::{NEST_ORDER, UNLABELED_GROUP_KEY, group_key};
pub use merge::merge_metadata;
pub use patterns::{compile_exclude_patterns, remove_keys_by_patterns, should_exclude};
pub use reduce::{ReduceRule, apply_reduce_rules};
pub use tree::{MetricTree, Node, VALUE_KEY, by_label_key, reshape};

use crate::Result;
use ohno::app_err;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat-record field consulted for the run's pass/fail status.
const PASSED_FIELD: &str = "passed";

/// Flat-record field holding accumulated execution errors; consumed by the
/// health score and removed from the record.
const EXECUTION_ERRORS_FIELD: &str = "execution_errors";

/// Flat-record field the derived health score is written to.
const HEALTH_SCORE_FIELD: &str = "cluster_health_score";

/// One run's raw payload: metric samples keyed by metric name, plus run
/// metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunPayload {
    pub metrics: BTreeMap<String, Vec<MetricSample>>,

    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Compiled, immutable rule set consumed by [`normalize_run`].
///
/// Built once from configuration (see `Config::compile`) and shared across
/// runs; compilation is the only place pattern errors can surface.
#[derive(Debug, Default)]
pub struct NormalizeRules {
    pub exclude_patterns: Vec<Regex>,
    pub data_filters: Vec<DataFilter>,
    pub extract_filters: Vec<ExtractFilter>,
    pub reduce_rules: Vec<ReduceRule>,
}

/// Normalize one run into a flat record.
///
/// Returns an empty record when the data-filter gate rejects the run.
///
/// # Errors
///
/// Returns an error if the surviving record has no boolean `passed` field,
/// since the health score cannot be derived without it.
pub fn normalize_run(payload: &RunPayload, rules: &NormalizeRules) -> Result<FlatRecord> {
    let mut grouped = GroupedMetrics::new();
    for (payload_name, samples) in &payload.metrics {
        group_samples(payload_name, samples, &rules.exclude_patterns, &mut grouped);
    }

    let tree = reshape(&grouped);
    let mut record = flatten_tree(&tree);
    merge_metadata(&mut record, payload.metadata.clone());

    if !passes_data_filters(&record, &rules.data_filters) {
        log::debug!("Run rejected by data filters");
        return Ok(FlatRecord::new());
    }

    apply_extract_filters(&mut record, &rules.extract_filters);
    apply_reduce_rules(&mut record, &rules.reduce_rules);

    let passed = record
        .get(PASSED_FIELD)
        .and_then(Value::as_bool)
        .ok_or_else(|| app_err!("run record has no boolean `{PASSED_FIELD}` field, cannot derive a health score"))?;

    let execution_errors = match record.remove(EXECUTION_ERRORS_FIELD) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    };

    let score = HealthScore::from_execution_errors(passed, &execution_errors);
    let _ = record.insert(HEALTH_SCORE_FIELD.to_string(), Value::String(score.to_string()));

    Ok(record)
}
