//! Configuration for the snowdrift loader.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::warehouse::{ObjectName, OnError};

/// Configuration for the input source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the CSV source file.
    pub path: PathBuf,
    /// Name of the timestamp column.
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Name of the numeric amount column.
    #[serde(default = "default_amount_column")]
    pub amount_column: String,
    /// Expected timestamp layout (chrono strftime syntax).
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

fn default_timestamp_column() -> String {
    "transaction_date".to_string()
}

fn default_amount_column() -> String {
    "amount".to_string()
}

fn default_timestamp_format() -> String {
    "%m/%d/%Y %H:%M".to_string()
}

/// Configuration for checkpoint persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: default_checkpoint_dir(),
        }
    }
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".snowdrift")
}

/// Configuration for the local staging spool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Directory for the local transfer file. Defaults to the system
    /// temp directory.
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,
}

impl StagingConfig {
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Configuration for the warehouse connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Base URL of the warehouse REST endpoint.
    pub endpoint: String,
    /// Optional bearer token.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Row-level error tolerance for the copy instruction.
    #[serde(default)]
    pub on_error: OnError,
}

fn default_timeout_secs() -> u64 {
    300
}

/// Main configuration for snowdrift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source configuration.
    pub source: SourceConfig,
    /// Qualified name of the warehouse stage.
    pub stage: String,
    /// Qualified name of the target table.
    pub table: String,
    /// Checkpoint configuration.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Staging spool configuration.
    #[serde(default)]
    pub staging: StagingConfig,
    /// Warehouse connection configuration.
    pub warehouse: WarehouseConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)
            .map_err(|source| ConfigError::YamlParse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySourcePath);
        }
        if self.warehouse.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        self.stage_name()?;
        self.table_name()?;
        Ok(())
    }

    /// The stage target as a parsed qualified name.
    pub fn stage_name(&self) -> Result<ObjectName, ConfigError> {
        ObjectName::parse(&self.stage)
    }

    /// The table target as a parsed qualified name.
    pub fn table_name(&self) -> Result<ObjectName, ConfigError> {
        ObjectName::parse(&self.table)
    }
}
