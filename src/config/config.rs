use crate::Result;
use crate::normalize::{DataFilter, ExtractFilter, NormalizeRules, ReduceRule, compile_exclude_patterns};
use camino::{Utf8Path, Utf8PathBuf};
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yml");

const fn default_chunk_size() -> usize {
    100
}

fn default_output_prefix() -> String {
    "run-tally".to_string()
}

fn default_output_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(".")
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Comma-separated regexes; metrics whose name contains a match are skipped.
    #[serde(default)]
    pub exclude_metrics: String,

    /// OR-combined exact-match gate rules, each a single `{key: value}` pair.
    /// An empty list rejects every run.
    #[serde(default)]
    pub data_filters: Vec<BTreeMap<String, Value>>,

    /// Allowlist rules, each a single `{key_pattern: value_pattern}` pair.
    #[serde(default)]
    pub extract_filters: Vec<BTreeMap<String, String>>,

    /// Reduce rules, each a single `{source_key_pattern: target_key}` pair.
    #[serde(default)]
    pub fields_to_reduce: Vec<BTreeMap<String, String>>,

    /// Number of rows per output CSV file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Prefix for output CSV file names.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Directory output CSV files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_metrics: String::new(),
            data_filters: Vec::new(),
            extract_filters: Vec::new(),
            fields_to_reduce: Vec::new(),
            chunk_size: default_chunk_size(),
            output_prefix: default_output_prefix(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<(Self, Vec<String>)> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading run-tally configuration from {path}"))?;
            (path.clone(), text)
        } else {
            let candidates = [
                base_dir.join("tally.toml"),
                base_dir.join("tally.yml"),
                base_dir.join("tally.yaml"),
                base_dir.join("tally.json"),
            ];

            let mut found = None;
            for path in &candidates {
                match fs::read_to_string(path) {
                    Ok(text) => {
                        found = Some((path.clone(), text));
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).into_app_err_with(|| format!("reading run-tally configuration from {path}")),
                }
            }

            let Some(result) = found else {
                return Ok((Self::default(), Vec::new()));
            };
            result
        };

        let extension = final_path.extension().unwrap_or_default();
        let config: Self = match extension {
            "toml" => toml::from_str(&text).into_app_err_with(|| format!("parsing TOML configuration from {final_path}"))?,
            "yml" | "yaml" => serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing YAML configuration from {final_path}"))?,
            "json" => serde_json::from_str(&text).into_app_err_with(|| format!("parsing JSON configuration from {final_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        let mut warnings = Vec::new();
        config.validate(&mut warnings);
        Ok((config, warnings))
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save(&self, output_path: &Utf8Path) -> Result<()> {
        let extension = output_path.extension().unwrap_or_default();
        let text = match extension {
            "toml" => {
                toml::to_string_pretty(self).into_app_err_with(|| format!("serializing configuration to TOML for saving to {output_path}"))?
            }
            "yml" | "yaml" => {
                serde_yaml::to_string(self).into_app_err_with(|| format!("serializing configuration to YAML for saving to {output_path}"))?
            }
            "json" => serde_json::to_string_pretty(self)
                .into_app_err_with(|| format!("serializing configuration to JSON for saving to {output_path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        fs::write(output_path, text).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
        Ok(())
    }

    /// Save the default configuration, keeping the explanatory comments when
    /// the target format is YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_default_with_comments(output_path: &Utf8Path) -> Result<()> {
        match output_path.extension().unwrap_or_default() {
            "yml" | "yaml" => {
                fs::write(output_path, DEFAULT_CONFIG_YAML).into_app_err_with(|| format!("writing configuration to {output_path}"))?;
                Ok(())
            }
            _ => Self::default().save(output_path),
        }
    }

    /// Check the configuration for problems that don't prevent execution.
    pub fn validate(&self, warnings: &mut Vec<String>) {
        if self.data_filters.is_empty() {
            warnings.push("data_filters is empty: every run will be rejected and no records will be produced".to_string());
        }

        for (idx, rule) in self.data_filters.iter().enumerate() {
            if rule.len() != 1 {
                warnings.push(format!("data_filters[{idx}] should hold exactly one key/value pair, found {}", rule.len()));
            }
        }
        for (idx, rule) in self.extract_filters.iter().enumerate() {
            if rule.len() != 1 {
                warnings.push(format!("extract_filters[{idx}] should hold exactly one pattern pair, found {}", rule.len()));
            }
        }
        for (idx, rule) in self.fields_to_reduce.iter().enumerate() {
            if rule.len() != 1 {
                warnings.push(format!("fields_to_reduce[{idx}] should hold exactly one pattern/target pair, found {}", rule.len()));
            }
        }

        if self.chunk_size == 0 {
            warnings.push("chunk_size is 0: all rows will be written into a single file".to_string());
        }
    }

    /// Compile the declarative filter configuration into the rule set the
    /// normalization pipeline consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured pattern is not a valid regular expression.
    pub fn compile(&self) -> Result<NormalizeRules> {
        let data_filters = self
            .data_filters
            .iter()
            .flatten()
            .map(|(key, value)| DataFilter {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        let extract_filters = self
            .extract_filters
            .iter()
            .flatten()
            .map(|(key_pattern, value_pattern)| ExtractFilter::new(key_pattern, value_pattern))
            .collect::<Result<_>>()?;

        let reduce_rules = self
            .fields_to_reduce
            .iter()
            .flatten()
            .map(|(source_pattern, target_key)| ReduceRule::new(source_pattern, target_key))
            .collect::<Result<_>>()?;

        Ok(NormalizeRules {
            exclude_patterns: compile_exclude_patterns(&self.exclude_metrics)?,
            data_filters,
            extract_filters,
            reduce_rules,
        })
    }
}
