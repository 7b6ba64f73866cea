//! Collapses nested structures into single-level records.
//!
//! Field names are formed by joining the path segments leading to a leaf with
//! `.`; elements of arrays and sample lists contribute their decimal index as a
//! segment. The `_value` key of a branched slot is kept as a literal segment,
//! so the mapping from tree leaves to flat keys is lossless.

use super::tree::{MetricTree, Node};
use serde_json::Value;
use std::collections::BTreeMap;

/// The pipeline's terminal artifact for one run: flat field name to scalar.
pub type FlatRecord = BTreeMap<String, Value>;

/// Flatten a nested metric tree into flat key/value pairs.
#[must_use]
pub fn flatten_tree(tree: &MetricTree) -> FlatRecord {
    let mut record = FlatRecord::new();
    for (metric_name, node) in tree {
        flatten_node(node, metric_name, &mut record);
    }
    record
}

fn flatten_node(node: &Node, path: &str, record: &mut FlatRecord) {
    match node {
        Node::Scalar(v) => {
            let _ = record.insert(path.to_string(), number_value(*v));
        }
        Node::Samples(list) => {
            for (idx, sample) in list.iter().enumerate() {
                for (key, value) in sample {
                    flatten_value(value, &join(&join(path, &idx.to_string()), key), record);
                }
            }
        }
        Node::Branch(children) => {
            for (key, child) in children {
                flatten_node(child, &join(path, key), record);
            }
        }
    }
}

/// Flatten arbitrary residual JSON (metadata, structured sample fields) with
/// the same path-joining rule used for metric trees.
pub fn flatten_value(value: &Value, path: &str, record: &mut FlatRecord) {
    match value {
        Value::Object(fields) => {
            for (key, child) in fields {
                flatten_value(child, &join(path, key), record);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten_value(item, &join(path, &idx.to_string()), record);
            }
        }
        _ => {
            let _ = record.insert(path.to_string(), value.clone());
        }
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}

fn number_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}
