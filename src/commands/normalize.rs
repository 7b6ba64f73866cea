use crate::commands::common::{LogLevel, init_logging, print_warnings};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::IntoAppError;
use run_tally::Result;
use run_tally::config::Config;
use run_tally::normalize::{FlatRecord, NormalizeRules, RunPayload, normalize_run};
use run_tally::output::RowCollector;
use std::fs;

#[derive(Parser, Debug)]
pub struct NormalizeArgs {
    /// Run payload JSON files to normalize
    #[arg(value_name = "PAYLOAD", required = true)]
    pub payloads: Vec<Utf8PathBuf>,

    /// Path to configuration file [default: one of tally.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory to write CSV chunks to, overriding the configured one
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

/// Normalize every payload file into flat records and write chunked CSVs.
///
/// A run that fails to parse or normalize is reported and skipped; the
/// remaining runs still produce output.
pub fn normalize_runs(args: &NormalizeArgs) -> Result<()> {
    init_logging(args.log_level);

    let (config, warnings) = Config::load(Utf8Path::new("."), args.config.as_ref())?;
    print_warnings(&warnings);
    let rules = config.compile()?;

    let mut collector = RowCollector::new();
    let mut failed = 0_usize;
    for path in &args.payloads {
        match normalize_file(path, &rules) {
            Ok(record) => collector.push(record),
            Err(e) => {
                failed += 1;
                eprintln!("❌ Skipping {path}: {e}");
            }
        }
    }

    if failed > 0 {
        eprintln!("⚠️  {failed} of {} payload file(s) could not be normalized", args.payloads.len());
    }

    if collector.is_empty() {
        println!("No records produced");
        return Ok(());
    }

    let output_dir = args.output_dir.as_ref().unwrap_or(&config.output_dir);
    let paths = collector.write_chunks(output_dir, &config.output_prefix, config.chunk_size)?;
    println!("Wrote {} record(s) across {} file(s)", collector.len(), paths.len());
    Ok(())
}

fn normalize_file(path: &Utf8Path, rules: &NormalizeRules) -> Result<FlatRecord> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading run payload from {path}"))?;
    let payload: RunPayload = serde_json::from_str(&text).into_app_err_with(|| format!("parsing run payload from {path}"))?;
    normalize_run(&payload, rules)
}
