use super::flatten::FlatRecord;
use crate::Result;
use ohno::IntoAppError;
use regex::Regex;
use serde_json::Value;

/// Collapses all fields matching a pattern into one aggregated field.
#[derive(Debug, Clone)]
pub struct ReduceRule {
    source_pattern: Regex,
    pub target_key: String,
}

impl ReduceRule {
    /// Compile a reduce rule. The source pattern matches anywhere inside a
    /// field name (unanchored search).
    ///
    /// # Errors
    ///
    /// Returns an error if the source pattern is not a valid regular expression.
    pub fn new(source_pattern: &str, target_key: &str) -> Result<Self> {
        Ok(Self {
            source_pattern: Regex::new(source_pattern)
                .into_app_err_with(|| format!("compiling reduce rule pattern `{source_pattern}`"))?,
            target_key: target_key.to_string(),
        })
    }
}

/// Apply every reduce rule to a flat record.
///
/// Each rule collapses its matching fields into the rule's target key: the
/// arithmetic mean when any of the collected values coerces to a number, the
/// median of the sorted values otherwise, and null when nothing usable
/// remains. A rule that matches no field is skipped. Rules never interfere
/// with each other; a degenerate rule degrades to its own fallback only.
pub fn apply_reduce_rules(record: &mut FlatRecord, rules: &[ReduceRule]) {
    for rule in rules {
        let matched: Vec<String> = record.keys().filter(|k| rule.source_pattern.is_match(k)).cloned().collect();
        if matched.is_empty() {
            continue;
        }

        let values: Vec<Value> = matched
            .iter()
            .filter_map(|k| record.get(k))
            .filter(|v| !is_discarded(v))
            .cloned()
            .collect();

        let reduced = reduce_values(&values);

        for key in &matched {
            if *key != rule.target_key {
                let _ = record.remove(key);
            }
        }
        let _ = record.insert(rule.target_key.clone(), reduced);
    }
}

// Nulls and the literal string "nan" carry no information.
fn is_discarded(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s == "nan",
        _ => false,
    }
}

fn reduce_values(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }

    let numeric: Vec<f64> = values.iter().filter_map(coerce_numeric).collect();
    if numeric.is_empty() {
        median(values)
    } else {
        #[expect(clippy::cast_precision_loss, reason = "Value counts are far below the f64 mantissa range")]
        let mean = numeric.iter().sum::<f64>() / numeric.len() as f64;
        serde_json::Number::from_f64(mean).map_or(Value::Null, Value::Number)
    }
}

fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Median over the values ordered by their rendered form; even counts resolve
/// to the lower of the two middle elements.
fn median(values: &[Value]) -> Value {
    let mut ordered: Vec<&Value> = values.iter().collect();
    ordered.sort_by_key(|v| rendered(v));
    ordered.get((ordered.len() - 1) / 2).map_or(Value::Null, |v| (*v).clone())
}

fn rendered(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FlatRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_numeric_values_reduce_to_mean_ignoring_null_and_nan() {
        let mut rec = record(json!({
            "quantile.p99.a": 1,
            "quantile.p99.b": "nan",
            "quantile.p99.c": null,
            "quantile.p99.d": 3
        }));

        let rules = vec![ReduceRule::new("quantile", "p99").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["p99"], json!(2.0));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_non_numeric_values_reduce_to_lower_median() {
        let mut rec = record(json!({"phase.one": "b", "phase.two": "a"}));

        let rules = vec![ReduceRule::new("phase", "phase").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["phase"], json!("a"));
    }

    #[test]
    fn test_rule_with_no_matches_is_skipped() {
        let mut rec = record(json!({"cpu": 1.0}));

        let rules = vec![ReduceRule::new("memory", "mem").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec.len(), 1);
        assert!(!rec.contains_key("mem"));
    }

    #[test]
    fn test_all_values_discarded_yields_null_target() {
        let mut rec = record(json!({"err.a": null, "err.b": "nan"}));

        let rules = vec![ReduceRule::new("err", "errors").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["errors"], Value::Null);
        assert!(!rec.contains_key("err.a"));
    }

    #[test]
    fn test_numeric_strings_participate_in_the_mean() {
        let mut rec = record(json!({"lat.a": "4", "lat.b": 8}));

        let rules = vec![ReduceRule::new("lat", "latency").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["latency"], json!(6.0));
    }

    #[test]
    fn test_mixed_values_use_mean_of_numeric_subset() {
        let mut rec = record(json!({"v.a": "fast", "v.b": 10}));

        let rules = vec![ReduceRule::new(r"v\.", "v").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["v"], json!(10.0));
    }

    #[test]
    fn test_target_key_matching_pattern_is_not_deleted() {
        let mut rec = record(json!({"latency": 2, "latency.p99": 4}));

        let rules = vec![ReduceRule::new("latency", "latency").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["latency"], json!(3.0));
        assert!(!rec.contains_key("latency.p99"));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn test_source_pattern_is_unanchored() {
        let mut rec = record(json!({"podLatency.p99": 4}));

        let rules = vec![ReduceRule::new("p99", "p99").unwrap()];
        apply_reduce_rules(&mut rec, &rules);

        assert_eq!(rec["p99"], json!(4.0));
    }
}
