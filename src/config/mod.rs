//! Configuration handling for run-tally

#[expect(clippy::module_inception, reason = "Submodule is an implementation detail behind re-exports")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_YAML};
