//! Tests covering the path from normalized records to chunked CSV files.

use camino::Utf8Path;
use run_tally::config::Config;
use run_tally::normalize::{RunPayload, normalize_run};
use run_tally::output::RowCollector;
use serde_json::json;

fn run(platform: &str, cpu: f64) -> RunPayload {
    serde_json::from_value(json!({
        "metrics": {"cpuUsage": [{"metricName": "cpuUsage", "value": cpu}]},
        "metadata": {"platform": platform, "passed": true}
    }))
    .unwrap()
}

#[test]
fn test_records_accumulate_and_chunk_into_files() {
    let cfg: Config = serde_yaml::from_str("data_filters:\n  - platform: AWS\nchunk_size: 2\n").unwrap();
    let rules = cfg.compile().unwrap();

    let mut collector = RowCollector::new();
    for i in 0..3 {
        collector.push(normalize_run(&run("AWS", f64::from(i)), &rules).unwrap());
    }
    // rejected by the gate, must not become a row
    collector.push(normalize_run(&run("GCP", 9.0), &rules).unwrap());

    assert_eq!(collector.len(), 3);
    assert_eq!(collector.fieldnames(), vec!["cluster_health_score", "cpuUsage", "passed", "platform"]);

    let dir = tempfile::tempdir().unwrap();
    let out_dir = Utf8Path::from_path(dir.path()).unwrap();
    let paths = collector.write_chunks(out_dir, &cfg.output_prefix, cfg.chunk_size).unwrap();
    assert_eq!(paths.len(), 2);

    let first = std::fs::read_to_string(&paths[0]).unwrap();
    let mut lines = first.lines();
    assert_eq!(lines.next(), Some("cluster_health_score,cpuUsage,passed,platform"));
    assert_eq!(lines.next(), Some("Green,0.0,true,AWS"));
}
