// Pipeline configuration: JSON file, then environment, then CLI flags

use crate::decoder::ContinuationMode;
use crate::error::{LedgerError, Result};
use crate::merger::DEFAULT_MAX_MERGE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_ACCOUNTS_CONFIGURATION: &str = "OCR_LEDGER_ACCOUNTS_CONFIGURATION";
pub const ENV_UNITS_RENAMED: &str = "OCR_LEDGER_UNITS_RENAMED";
pub const ENV_DB_PATH: &str = "OCR_LEDGER_DB_PATH";

fn default_max_merge() -> usize {
    DEFAULT_MAX_MERGE
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/ledger.db")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Most truncated rows folded into one ROW
    #[serde(default = "default_max_merge")]
    pub max_merge: usize,

    #[serde(default)]
    pub continuation_mode: ContinuationMode,

    /// Accounts configuration CSV; enrichment columns are added when set
    #[serde(default)]
    pub accounts_configuration: Option<PathBuf>,

    /// Unit rename CSV
    #[serde(default)]
    pub units_renamed: Option<PathBuf>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_merge: default_max_merge(),
            continuation_mode: ContinuationMode::default(),
            accounts_configuration: None,
            units_renamed: None,
            output_dir: default_output_dir(),
            db_path: default_db_path(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `OCR_LEDGER_*` environment overrides.
    pub fn apply_env(self) -> Self {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = non_empty(ENV_ACCOUNTS_CONFIGURATION) {
            self.accounts_configuration = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty(ENV_UNITS_RENAMED) {
            self.units_renamed = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty(ENV_DB_PATH) {
            self.db_path = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_merge == 0 {
            return Err(LedgerError::Config(
                "max_merge must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
