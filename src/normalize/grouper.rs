use super::labels::{group_key, prune_to_nest_order};
use super::patterns::should_exclude;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

const LOG_TARGET: &str = "grouper";

/// Job name whose samples are always discarded, compared case-insensitively.
const GARBAGE_COLLECTION_JOB: &str = "garbage-collection";

/// One raw time-series sample from a run payload.
///
/// Only a handful of fields are interpreted; everything else lands in `residual`
/// and survives grouping when the sample carries no scalar value (structured
/// quantile records and the like). The named fields double as the fixed strip
/// list applied to such samples.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricSample {
    #[serde(rename = "metricName")]
    pub metric_name: Option<String>,

    pub labels: Option<BTreeMap<String, String>>,

    /// Scalar measurement. Samples without one (or with a non-numeric one) are
    /// treated as structured records.
    pub value: Option<Value>,

    #[serde(rename = "jobName")]
    pub job_name: Option<String>,

    /// Marks samples produced during churn phases; these never contribute.
    #[serde(rename = "churnMetric")]
    pub churn_metric: Option<bool>,

    pub uuid: Option<Value>,
    pub timestamp: Option<Value>,
    pub query: Option<Value>,
    pub metadata: Option<Value>,

    #[serde(flatten)]
    pub residual: Map<String, Value>,
}

impl MetricSample {
    fn scalar_value(&self) -> Option<f64> {
        self.value.as_ref().and_then(Value::as_f64)
    }

    fn is_dropped(&self) -> bool {
        if self.churn_metric == Some(true) {
            return true;
        }
        self.job_name
            .as_deref()
            .is_some_and(|j| j.eq_ignore_ascii_case(GARBAGE_COLLECTION_JOB))
    }
}

/// Accumulated value of one label group.
///
/// The slot starts out as a running scalar and flips, at most once, to a list of
/// residual objects when a structured sample joins the group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    Scalar(f64),
    Samples(Vec<Map<String, Value>>),
}

/// One emitted record per label group of a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRecord {
    pub value: GroupValue,

    /// The group's labels, pruned to the recognized nesting dimensions.
    pub labels: BTreeMap<String, String>,
}

/// Grouper output, shared across repeated calls for accumulation.
pub type GroupedMetrics = BTreeMap<String, Vec<GroupRecord>>;

#[derive(Debug, Default)]
struct Accumulator {
    value: Option<GroupValue>,
    labels: BTreeMap<String, String>,
}

impl Accumulator {
    /// Fold a scalar contribution into the slot.
    ///
    /// The first contribution sets the value; each later one applies the
    /// halving accumulator `v = v + next/2`. This is intentionally not an
    /// arithmetic mean and must stay that way for compatibility with records
    /// produced by earlier collectors. Scalars arriving after the slot has
    /// flipped to a sample list are dropped, matching the one-way transition.
    fn fold_scalar(&mut self, sample_value: f64) {
        match &mut self.value {
            None => self.value = Some(GroupValue::Scalar(sample_value)),
            Some(GroupValue::Scalar(current)) => *current += sample_value / 2.0,
            Some(GroupValue::Samples(_)) => {}
        }
    }

    /// Append a structured sample's residual fields, discarding any scalar the
    /// slot held so far.
    fn push_residual(&mut self, residual: Map<String, Value>) {
        match &mut self.value {
            Some(GroupValue::Samples(list)) => list.push(residual),
            _ => self.value = Some(GroupValue::Samples(vec![residual])),
        }
    }
}

/// Collapse one metric's raw samples into per-label-group records, appending
/// them to `grouped`.
///
/// `payload_name` is the key the samples were filed under in the payload and is
/// used for diagnostics only; the authoritative metric name comes from the
/// first sample. Metrics whose first sample lacks a name are skipped whole, as
/// are metrics matching an exclusion pattern. Records from earlier calls for
/// the same metric are preserved.
pub fn group_samples(payload_name: &str, samples: &[MetricSample], exclude_patterns: &[Regex], grouped: &mut GroupedMetrics) {
    let Some(first) = samples.first() else {
        return;
    };

    let Some(metric_name) = first.metric_name.clone() else {
        log::warn!(target: LOG_TARGET, "Skipping metric '{payload_name}': first sample has no metricName");
        return;
    };

    if should_exclude(&metric_name, exclude_patterns) {
        log::debug!(target: LOG_TARGET, "Skipping excluded metric '{metric_name}'");
        return;
    }

    // Partition by label group, keeping first-seen group order so repeated runs
    // over the same payload produce identical output.
    let mut order = Vec::new();
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for sample in samples {
        if sample.is_dropped() {
            continue;
        }

        let key = group_key(sample.labels.as_ref());
        let acc = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Accumulator {
                value: None,
                labels: sample.labels.as_ref().map(prune_to_nest_order).unwrap_or_default(),
            }
        });

        if let Some(sample_value) = sample.scalar_value() {
            acc.fold_scalar(sample_value);
        } else {
            acc.push_residual(sample.residual.clone());
        }
    }

    let records = order.into_iter().filter_map(|key| {
        let acc = groups.remove(&key)?;
        acc.value.map(|value| GroupRecord { value, labels: acc.labels })
    });

    grouped.entry(metric_name).or_default().extend(records);
}
