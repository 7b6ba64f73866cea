//! Output sinks for normalized run records
//!
//! The [`RowCollector`] accumulates flat records across runs and hands them to
//! the chunked CSV file sink. Sinks take an explicit field-name list plus row
//! mappings and preserve both field order and row content; they know nothing
//! about how the records were produced.

mod csv;

pub use self::csv::write_csv;

use crate::Result;
use crate::normalize::FlatRecord;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use ohno::IntoAppError;
use std::collections::BTreeSet;
use std::fs::File;

const LOG_TARGET: &str = "output";

/// Accumulates per-run flat records and derives the CSV column set.
#[derive(Debug, Default)]
pub struct RowCollector {
    rows: Vec<FlatRecord>,
}

impl RowCollector {
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Add one run's record. Empty records (runs rejected by the gate) are
    /// ignored.
    pub fn push(&mut self, record: FlatRecord) {
        if record.is_empty() {
            log::debug!(target: LOG_TARGET, "Ignoring empty record");
            return;
        }
        self.rows.push(record);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// The union of all field names across collected rows, sorted so columns
    /// stay stable regardless of run arrival order.
    #[must_use]
    pub fn fieldnames(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self.rows.iter().flat_map(FlatRecord::keys).collect();
        names.into_iter().cloned().collect()
    }

    /// Write the collected rows as chunked CSV files under `output_dir`,
    /// `chunk_size` rows per file, and return the paths written.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk file cannot be created or written.
    pub fn write_chunks(&self, output_dir: &Utf8Path, prefix: &str, chunk_size: usize) -> Result<Vec<Utf8PathBuf>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }

        let fieldnames = self.fieldnames();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        // chunk_size 0 degenerates to a single file holding everything
        let chunk_size = if chunk_size == 0 { self.rows.len() } else { chunk_size };

        let mut paths = Vec::new();
        for (idx, chunk) in self.rows.chunks(chunk_size).enumerate() {
            let path = output_dir.join(format!("{prefix}_{timestamp}_chunk_{}.csv", idx + 1));
            let file = File::create(&path).into_app_err_with(|| format!("creating output file {path}"))?;
            write_csv(&fieldnames, chunk, file)?;
            log::info!(target: LOG_TARGET, "Wrote {} row(s) to {path}", chunk.len());
            paths.push(path);
        }
        Ok(paths)
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
    fn test_empty_records_are_ignored() {
        let mut collector = RowCollector::new();
        collector.push(FlatRecord::new());
        assert!(collector.is_empty());
    }

    #[test]
    fn test_fieldnames_are_the_sorted_union() {
        let mut collector = RowCollector::new();
        collector.push(record(json!({"b": 1})));
        collector.push(record(json!({"a": 2, "c": 3})));
        assert_eq!(collector.fieldnames(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_write_chunks_splits_rows_by_chunk_size() {
        let mut collector = RowCollector::new();
        for i in 0..5 {
            collector.push(record(json!({"run": i})));
        }

        let dir = tempfile::tempdir().unwrap();
        let out_dir = Utf8Path::from_path(dir.path()).unwrap();
        let paths = collector.write_chunks(out_dir, "test", 2).unwrap();

        assert_eq!(paths.len(), 3);
        let first = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(first, "run\n0\n1\n");
        let last = std::fs::read_to_string(&paths[2]).unwrap();
        assert_eq!(last, "run\n4\n");
    }

    #[test]
    fn test_write_chunks_with_no_rows_writes_nothing() {
        let collector = RowCollector::new();
        let dir = tempfile::tempdir().unwrap();
        let out_dir = Utf8Path::from_path(dir.path()).unwrap();
        assert!(collector.write_chunks(out_dir, "test", 10).unwrap().is_empty());
    }

    #[test]
    fn test_zero_chunk_size_writes_a_single_file() {
        let mut collector = RowCollector::new();
        collector.push(record(json!({"run": 1})));
        collector.push(record(json!({"run": 2})));

        let dir = tempfile::tempdir().unwrap();
        let out_dir = Utf8Path::from_path(dir.path()).unwrap();
        let paths = collector.write_chunks(out_dir, "test", 0).unwrap();
        assert_eq!(paths.len(), 1);
    }
}
