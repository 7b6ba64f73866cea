//! A tool to normalize benchmark run payloads into flat tabular records.
//!
//! # Overview
//!
//! `run-tally` ingests the raw metric payload of one or more benchmark runs
//! (JSON files holding per-metric sample lists plus run metadata), normalizes
//! each run into a single flat record, and writes the accumulated records as
//! chunked CSV files ready for warehouse ingestion.
//!
//! Normalization groups same-label samples per metric, reshapes the label
//! hierarchy into a nested tree, flattens the tree into dot-joined scalar
//! fields, merges run metadata, applies the configured gate/allowlist/reduce
//! rules, and derives a categorical cluster health score.
//!
//! # Quick Start
//!
//! ```bash
//! run-tally init                     # generate tally.yml
//! run-tally normalize run1.json run2.json
//! ```
//!
//! # Configuration
//!
//! Configuration is read from `tally.[toml|yml|yaml|json]` in the current
//! directory, or from an explicit `--config` path:
//!
//! ```yaml
//! exclude_metrics: "etcd,gc"
//! data_filters:
//!   - platform: AWS
//! extract_filters:
//!   - "env\\.": "env\\.prod"
//! fields_to_reduce:
//!   - "p99": "latency_p99"
//! chunk_size: 100
//! output_prefix: "run-tally"
//! output_dir: "."
//! ```
//!
//! Note that an empty `data_filters` list rejects every run; configure at
//! least one gate rule to get any output.
//!
//! # Diagnostics
//!
//! Pass `--log-level info` (or `debug`, `trace`) to `normalize` to see which
//! metrics and runs were skipped and which files were written. `RUST_LOG`
//! overrides the level.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use run_tally::Result;

mod commands;

use crate::commands::{InitArgs, NormalizeArgs, ValidateArgs, init_config, normalize_runs, validate_config};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "run-tally", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: TallySubcommand,
}

#[derive(Subcommand, Debug)]
enum TallySubcommand {
    /// Normalize run payload files and write chunked CSV records
    Normalize(Box<NormalizeArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

fn main() -> Result<()> {
    match &Cli::parse().command {
        TallySubcommand::Normalize(normalize_args) => normalize_runs(normalize_args),
        TallySubcommand::Init(init_args) => init_config(init_args),
        TallySubcommand::Validate(validate_args) => validate_config(validate_args),
    }
}
