use crate::Result;
use ohno::IntoAppError;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Compile a comma-separated list of exclusion patterns.
///
/// An empty or all-whitespace input yields an empty list, which excludes nothing.
///
/// # Errors
///
/// Returns an error if any of the patterns is not a valid regular expression.
pub fn compile_exclude_patterns(patterns: &str) -> Result<Vec<Regex>> {
    if patterns.trim().is_empty() {
        return Ok(Vec::new());
    }

    patterns
        .split(',')
        .map(str::trim)
        .map(|p| Regex::new(p).into_app_err_with(|| format!("compiling metric exclusion pattern `{p}`")))
        .collect()
}

/// Report whether a metric name is matched by any exclusion pattern.
///
/// Patterns match anywhere inside the name (unanchored search), not just at the start.
#[must_use]
pub fn should_exclude(metric_name: &str, patterns: &[Regex]) -> bool {
    patterns.iter().any(|p| p.is_match(metric_name))
}

/// Remove every entry whose key matches one of the given patterns.
pub fn remove_keys_by_patterns(data: &mut BTreeMap<String, Value>, patterns: &[Regex]) {
    data.retain(|k, _| !patterns.iter().any(|p| p.is_match(k)));
}
