use super::flatten::FlatRecord;
use super::patterns::remove_keys_by_patterns;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Metadata keys never carried into the flat record: anything mentioning a
/// time, plus the run identifier and tool version.
static EXCLUDED_METADATA_KEYS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new("(?i)time").expect("invalid regex"),
        Regex::new("^uuid$").expect("invalid regex"),
        Regex::new("^version$").expect("invalid regex"),
    ]
});

const JOB_CONFIG_KEY: &str = "jobConfig";

/// Fold run metadata into the flat record.
///
/// Excluded keys are dropped first. The nested `jobConfig` object contributes
/// its keys under a `jobConfig.` prefix; every other surviving key is merged
/// in directly.
pub fn merge_metadata(record: &mut FlatRecord, mut metadata: BTreeMap<String, Value>) {
    remove_keys_by_patterns(&mut metadata, &EXCLUDED_METADATA_KEYS);

    for (key, value) in metadata {
        if key == JOB_CONFIG_KEY {
            if let Value::Object(job_config) = value {
                for (job_key, job_value) in job_config {
                    let _ = record.insert(format!("{JOB_CONFIG_KEY}.{job_key}"), job_value);
                }
            }
        } else {
            let _ = record.insert(key, value);
        }
    }
}
