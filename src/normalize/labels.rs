use std::collections::BTreeMap;

/// Label dimensions recognized by the nesting step, in precedence order.
///
/// Branches in a nested metric tree are created only for dimensions present in a
/// sample's labels, and always in this order.
pub const NEST_ORDER: [&str; 8] = [
    "mode",
    "scope",
    "verb",
    "namespace",
    "component",
    "resource",
    "container",
    "endpoint",
];

/// Group key assigned to samples with no labels, so that all unlabeled samples
/// of a metric collapse into a single group.
pub const UNLABELED_GROUP_KEY: &str = "<unlabeled>";

// Separates key/value pairs inside a group key. Cannot appear in label text
// coming out of JSON object keys in practice, and keeps keys readable in logs.
const PAIR_SEPARATOR: char = '\u{1f}';

/// Produce a deterministic grouping key for a label mapping.
///
/// Two mappings with the same key/value pairs produce the same key regardless of
/// insertion order. Empty or absent labels map to [`UNLABELED_GROUP_KEY`].
#[must_use]
pub fn group_key(labels: Option<&BTreeMap<String, String>>) -> String {
    match labels {
        None => UNLABELED_GROUP_KEY.to_string(),
        Some(labels) if labels.is_empty() => UNLABELED_GROUP_KEY.to_string(),
        Some(labels) => {
            let mut key = String::new();
            for (k, v) in labels {
                if !key.is_empty() {
                    key.push(PAIR_SEPARATOR);
                }
                key.push_str(k);
                key.push('=');
                key.push_str(v);
            }
            key
        }
    }
}

/// Prune a label mapping down to the dimensions recognized by [`NEST_ORDER`].
#[must_use]
pub fn prune_to_nest_order(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(k, _)| NEST_ORDER.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
