//! Run configuration
//!
//! A JSON file, validated on load. Only the three paths are required;
//! everything else has a default. Relative paths resolve against the
//! directory holding the config file.
//!
//! ```json
//! {
//!   "hierarchy_path": "nodes.jsonl",
//!   "ledger_path": "ledger.jsonl",
//!   "store_dir": "rollups",
//!   "concurrency": 16,
//!   "candidates": "with_events"
//! }
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::CandidatePolicy;
use crate::ledger::{IndexOptions, DEFAULT_SCALE, MAX_SCALE};
use crate::observability::Severity;
use crate::scheduler::{SchedulerConfig, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};

/// Upper bound on the worker pool size
pub const MAX_CONCURRENCY: usize = 1024;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "ROLLUP_CONFIG_READ",
            ConfigError::Parse(_) => "ROLLUP_CONFIG_PARSE",
            ConfigError::Invalid(_) => "ROLLUP_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// JSON-lines node export
    pub hierarchy_path: PathBuf,

    /// JSON-lines ledger export
    pub ledger_path: PathBuf,

    /// Directory of the file rollup store
    pub store_dir: PathBuf,

    /// Worker pool size (default: 16)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Candidates per progress batch (default: 500)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Fractional digits kept for amounts (default: 8)
    #[serde(default = "default_amount_scale")]
    pub amount_scale: u32,

    /// Hours past UTC midnight at which a day starts (default: 0)
    #[serde(default)]
    pub cutover_offset_hours: i32,

    /// Which nodes get a record (default: all)
    #[serde(default)]
    pub candidates: CandidatePolicy,

    /// Event kinds counted as production; all kinds when absent
    #[serde(default)]
    pub kinds: Option<Vec<String>>,

    /// Skip keys already persisted from the same snapshot (default: false)
    #[serde(default)]
    pub resume: bool,

    /// Failed nodes tolerated before the run exits non-zero (default: 0)
    #[serde(default)]
    pub failure_threshold: usize,

    /// Minimum log severity (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_amount_scale() -> u32 {
    DEFAULT_SCALE
}
fn default_log_level() -> String {
    "info".to_string()
}

impl RunConfig {
    /// Minimal config with every optional field at its default
    pub fn new(
        hierarchy_path: impl Into<PathBuf>,
        ledger_path: impl Into<PathBuf>,
        store_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hierarchy_path: hierarchy_path.into(),
            ledger_path: ledger_path.into(),
            store_dir: store_dir.into(),
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            amount_scale: default_amount_scale(),
            cutover_offset_hours: 0,
            candidates: CandidatePolicy::default(),
            kinds: None,
            resume: false,
            failure_threshold: 0,
            log_level: default_log_level(),
        }
    }

    /// Read, resolve and validate a config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse without touching the filesystem; not validated.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.hierarchy_path,
            &mut self.ledger_path,
            &mut self.store_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (name, path) in [
            ("hierarchy_path", &self.hierarchy_path),
            ("ledger_path", &self.ledger_path),
            ("store_dir", &self.store_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be in 1..={}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".into()));
        }
        if self.amount_scale > MAX_SCALE {
            return Err(ConfigError::Invalid(format!(
                "amount_scale must be <= {}, got {}",
                MAX_SCALE, self.amount_scale
            )));
        }
        if !(-23..=23).contains(&self.cutover_offset_hours) {
            return Err(ConfigError::Invalid(format!(
                "cutover_offset_hours must be in -23..=23, got {}",
                self.cutover_offset_hours
            )));
        }
        if let Some(kinds) = &self.kinds {
            if kinds.is_empty() || kinds.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "kinds must list at least one non-empty kind".into(),
                ));
            }
        }
        self.severity()?;

        Ok(())
    }

    pub fn severity(&self) -> ConfigResult<Severity> {
        self.log_level.parse().map_err(ConfigError::Invalid)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrency: self.concurrency,
            batch_size: self.batch_size,
            resume: self.resume,
        }
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            scale: self.amount_scale,
            kinds: self
                .kinds
                .as_ref()
                .map(|k| k.iter().cloned().collect::<BTreeSet<String>>()),
        }
    }
}
