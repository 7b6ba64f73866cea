use super::flatten::FlatRecord;
use crate::Result;
use ohno::IntoAppError;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;

/// Exact-match gate rule; a run is emitted only if at least one rule matches.
#[derive(Debug, Clone)]
pub struct DataFilter {
    pub key: String,
    pub value: Value,
}

/// Allowlist rule over families of flat-record keys.
///
/// `key_pattern` selects the candidate family; `value_pattern` selects which of
/// those candidates survive. Both match against key names, anchored at the
/// start of the name.
#[derive(Debug, Clone)]
pub struct ExtractFilter {
    key_pattern: Regex,
    value_pattern: Regex,
}

impl ExtractFilter {
    /// Compile an allowlist rule from its two patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if either pattern is not a valid regular expression.
    pub fn new(key_pattern: &str, value_pattern: &str) -> Result<Self> {
        Ok(Self {
            key_pattern: anchored(key_pattern)?,
            value_pattern: anchored(value_pattern)?,
        })
    }
}

// The original call sites match from the start of the key, not anywhere inside
// it; wrapping keeps that semantic even for patterns without an explicit `^`.
fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})")).into_app_err_with(|| format!("compiling extract filter pattern `{pattern}`"))
}

/// Decide whether a flat record passes the data-filter gate.
///
/// Rules combine with OR and compare by exact value equality. An empty rule
/// list rejects every run; the gate is default-deny.
#[must_use]
pub fn passes_data_filters(record: &FlatRecord, filters: &[DataFilter]) -> bool {
    filters.iter().any(|f| record.get(&f.key) == Some(&f.value))
}

/// Apply the extract-filter allowlist to a flat record.
///
/// Every key that is a candidate under some rule but kept under none is
/// removed. Keys never selected as a candidate are left untouched.
pub fn apply_extract_filters(record: &mut FlatRecord, filters: &[ExtractFilter]) {
    if filters.is_empty() {
        return;
    }

    let mut candidates = BTreeSet::new();
    let mut kept = BTreeSet::new();
    for filter in filters {
        for key in record.keys() {
            if filter.key_pattern.is_match(key) {
                let _ = candidates.insert(key.clone());
                if keeps(&filter.value_pattern, key) {
                    let _ = kept.insert(key.clone());
                }
            }
        }
    }

    record.retain(|key, _| !candidates.contains(key) || kept.contains(key));
}

/// A value pattern keeps a key when it matches the key itself or any
/// dot-delimited prefix of it, so keeping a key keeps the whole family of
/// fields flattened out of it: `^env\.prod$` retains both `env.prod` and
/// `env.prod.region`.
fn keeps(value_pattern: &Regex, key: &str) -> bool {
    if value_pattern.is_match(key) {
        return true;
    }
    key.match_indices('.').any(|(idx, _)| value_pattern.is_match(&key[..idx]))
}
