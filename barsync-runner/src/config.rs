//! Serializable fleet configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! The CLI overrides individual fields from flags after loading.

use barsync_core::domain::Interval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("symbol list not found: {0}")]
    MissingSymbolList(PathBuf),

    #[error("symbol list {path}: {reason}")]
    SymbolList { path: PathBuf, reason: String },

    #[error("symbol list {path} has no column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for one fleet run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    /// CSV file listing the instruments to sync.
    pub source_file: PathBuf,
    /// Root directory of the archive store.
    pub archive_dir: PathBuf,
    /// Appended to each symbol before it is sent to the provider.
    pub market_suffix: String,
    pub max_workers: usize,
    /// Random pause before each task, in milliseconds.
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub intervals: Vec<Interval>,
    /// Extra attempts for rate-limit and network failures.
    pub retries: u32,
    pub retry_base_delay_ms: u64,
    pub symbol_column: String,
    pub name_column: String,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            source_file: PathBuf::from("EQUITY_L.csv"),
            archive_dir: PathBuf::from("."),
            market_suffix: ".NS".into(),
            max_workers: 4,
            jitter_min_ms: 100,
            jitter_max_ms: 500,
            intervals: Interval::ALL.to_vec(),
            retries: 0,
            retry_base_delay_ms: 2_000,
            symbol_column: "SYMBOL".into(),
            name_column: "NAME OF COMPANY".into(),
        }
    }
}

impl FleetConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.jitter_min_ms > self.jitter_max_ms {
            return Err(ConfigError::Invalid(format!(
                "jitter_min_ms ({}) exceeds jitter_max_ms ({})",
                self.jitter_min_ms, self.jitter_max_ms
            )));
        }
        if self.intervals.is_empty() {
            return Err(ConfigError::Invalid("no intervals selected".into()));
        }
        if self.symbol_column.trim().is_empty() || self.name_column.trim().is_empty() {
            return Err(ConfigError::Invalid("column names must not be empty".into()));
        }
        Ok(())
    }
}
