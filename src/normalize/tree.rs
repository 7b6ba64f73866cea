use super::grouper::{GroupRecord, GroupValue, GroupedMetrics};
use super::labels::NEST_ORDER;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved child key holding a node's own value once the node has grown, or
/// may grow, label branches.
pub const VALUE_KEY: &str = "_value";

/// One slot in a nested metric tree.
///
/// A slot's represented type can shift as samples accumulate: a scalar flips to
/// a sample list when a structured group lands on it, and either gets wrapped
/// into a branch (under [`VALUE_KEY`]) when a more specific group needs to
/// attach siblings below it.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(f64),
    Samples(Vec<Map<String, Value>>),
    Branch(BTreeMap<String, Node>),
}

impl From<&GroupValue> for Node {
    fn from(value: &GroupValue) -> Self {
        match value {
            GroupValue::Scalar(v) => Self::Scalar(*v),
            GroupValue::Samples(list) => Self::Samples(list.clone()),
        }
    }
}

/// Nested tree for a full run: metric name to its root slot.
pub type MetricTree = BTreeMap<String, Node>;

/// Branch key for one label dimension, e.g. `verb` becomes `byLabelVerb`.
#[must_use]
pub fn by_label_key(dimension: &str) -> String {
    let mut key = String::from("byLabel");
    let mut chars = dimension.chars();
    if let Some(first) = chars.next() {
        key.extend(first.to_uppercase());
        key.push_str(chars.as_str());
    }
    key
}

/// Reshape grouped metrics into a label-ordered nested tree.
///
/// Group records are consumed in order; the halving accumulator applies
/// whenever two scalar contributions meet, so input order is significant.
#[must_use]
pub fn reshape(grouped: &GroupedMetrics) -> MetricTree {
    let mut tree = MetricTree::new();
    for (metric_name, records) in grouped {
        for record in records {
            reshape_record(&mut tree, metric_name, record);
        }
    }
    tree
}

fn reshape_record(tree: &mut MetricTree, metric_name: &str, record: &GroupRecord) {
    if record.labels.is_empty() {
        // Label-less groups fold directly onto the metric's own slot; if that
        // slot has already branched, the contribution lands on its `_value`
        // child instead of overwriting the branch.
        fold_leaf(tree, metric_name, &record.value);
        return;
    }

    let mut current = branch_children(tree, metric_name);
    for dimension in NEST_ORDER {
        let Some(label_value) = record.labels.get(dimension) else {
            continue;
        };
        current = branch_children(current, &by_label_key(dimension));
        current = branch_children(current, label_value);
    }
    fold_leaf(current, VALUE_KEY, &record.value);
}

/// Descend into the branch at `key`, creating it if absent.
///
/// A slot holding a bare scalar (or sample list) is first wrapped as
/// `{_value: old}` so the descent can attach siblings next to it.
fn branch_children<'a>(map: &'a mut BTreeMap<String, Node>, key: &str) -> &'a mut BTreeMap<String, Node> {
    let slot = map.entry(key.to_string()).or_insert_with(|| Node::Branch(BTreeMap::new()));

    if !matches!(slot, Node::Branch(_)) {
        let wrapped = core::mem::replace(slot, Node::Branch(BTreeMap::new()));
        if let Node::Branch(children) = slot {
            let _ = children.insert(VALUE_KEY.to_string(), wrapped);
        }
    }

    match slot {
        Node::Branch(children) => children,
        _ => unreachable!("slot was just coerced to a branch"),
    }
}

/// Fold a group value onto the slot at `key`, applying the halving accumulator
/// when two scalars meet and honoring the one-way scalar-to-list transition.
fn fold_leaf(map: &mut BTreeMap<String, Node>, key: &str, value: &GroupValue) {
    let folded = match map.remove(key) {
        None => Node::from(value),
        Some(Node::Scalar(current)) => match value {
            GroupValue::Scalar(v) => Node::Scalar(current + v / 2.0),
            GroupValue::Samples(list) => Node::Samples(list.clone()),
        },
        Some(Node::Samples(mut list)) => {
            if let GroupValue::Samples(more) = value {
                list.extend(more.iter().cloned());
            }
            Node::Samples(list)
        }
        Some(Node::Branch(mut children)) => {
            fold_leaf(&mut children, VALUE_KEY, value);
            Node::Branch(children)
        }
    };
    let _ = map.insert(key.to_string(), folded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn scalar_record(value: f64, label_pairs: &[(&str, &str)]) -> GroupRecord {
        GroupRecord {
            value: GroupValue::Scalar(value),
            labels: labels(label_pairs),
        }
    }

    #[test]
    fn test_by_label_key_capitalizes_dimension() {
        assert_eq!(by_label_key("verb"), "byLabelVerb");
        assert_eq!(by_label_key("namespace"), "byLabelNamespace");
    }

    #[test]
    fn test_unlabeled_group_lands_on_metric_slot() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert("cpu".to_string(), vec![scalar_record(4.0, &[])]);

        let tree = reshape(&grouped);
        assert_eq!(tree["cpu"], Node::Scalar(4.0));
    }

    #[test]
    fn test_two_unlabeled_groups_fold_with_halving_average() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert("cpu".to_string(), vec![scalar_record(4.0, &[]), scalar_record(6.0, &[])]);

        let tree = reshape(&grouped);
        assert_eq!(tree["cpu"], Node::Scalar(7.0)); // 4 + 6/2
    }

    #[test]
    fn test_labeled_group_walks_nest_order() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert(
            "latency".to_string(),
            vec![scalar_record(1.5, &[("verb", "GET"), ("scope", "cluster")])],
        );

        let tree = reshape(&grouped);

        // scope precedes verb in the nesting order
        let Node::Branch(metric) = &tree["latency"] else { panic!("expected branch") };
        let Node::Branch(by_scope) = &metric["byLabelScope"] else { panic!("expected branch") };
        let Node::Branch(cluster) = &by_scope["cluster"] else { panic!("expected branch") };
        let Node::Branch(by_verb) = &cluster["byLabelVerb"] else { panic!("expected branch") };
        let Node::Branch(get) = &by_verb["GET"] else { panic!("expected branch") };
        assert_eq!(get[VALUE_KEY], Node::Scalar(1.5));
    }

    #[test]
    fn test_scalar_slot_is_wrapped_when_branch_grows_through_it() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert(
            "latency".to_string(),
            vec![
                scalar_record(2.0, &[]),
                scalar_record(5.0, &[("verb", "GET")]),
            ],
        );

        let tree = reshape(&grouped);
        let Node::Branch(metric) = &tree["latency"] else { panic!("expected branch") };
        assert_eq!(metric[VALUE_KEY], Node::Scalar(2.0));
        assert!(metric.contains_key("byLabelVerb"));
    }

    #[test]
    fn test_unlabeled_contribution_to_branched_metric_goes_under_value_key() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert(
            "latency".to_string(),
            vec![
                scalar_record(5.0, &[("verb", "GET")]),
                scalar_record(2.0, &[]),
            ],
        );

        let tree = reshape(&grouped);
        let Node::Branch(metric) = &tree["latency"] else { panic!("expected branch") };
        assert_eq!(metric[VALUE_KEY], Node::Scalar(2.0));
    }

    #[test]
    fn test_halving_average_applies_at_leaves() {
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert(
            "latency".to_string(),
            vec![
                scalar_record(2.0, &[("verb", "GET")]),
                scalar_record(4.0, &[("verb", "GET")]),
            ],
        );

        let tree = reshape(&grouped);
        let Node::Branch(metric) = &tree["latency"] else { panic!("expected branch") };
        let Node::Branch(by_verb) = &metric["byLabelVerb"] else { panic!("expected branch") };
        let Node::Branch(get) = &by_verb["GET"] else { panic!("expected branch") };
        assert_eq!(get[VALUE_KEY], Node::Scalar(4.0)); // 2 + 4/2
    }

    #[test]
    fn test_sample_list_group_lands_at_leaf() {
        let residual = json!({"quantileName": "Ready", "p99": 100}).as_object().cloned().unwrap();
        let mut grouped = GroupedMetrics::new();
        let _ = grouped.insert(
            "podLatency".to_string(),
            vec![GroupRecord {
                value: GroupValue::Samples(vec![residual.clone()]),
                labels: BTreeMap::new(),
            }],
        );

        let tree = reshape(&grouped);
        assert_eq!(tree["podLatency"], Node::Samples(vec![residual]));
    }
}
