//! Warehouse client capability.
//!
//! The pipeline only needs two operations from the warehouse: upload a
//! transfer file to a named stage, and copy a staged file into a table.
//! Everything vendor-specific (credentials, session lifecycle, wire
//! protocol) stays behind the [`WarehouseClient`] trait so the core control
//! flow can be exercised against an in-memory double.

mod rest;

pub use rest::RestWarehouse;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, WarehouseError};

/// A qualified warehouse object name: `<database>.<schema>.<name>`.
///
/// Addresses both stages and tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub database: String,
    pub schema: String,
    pub name: String,
}

impl ObjectName {
    /// Parse a dotted qualified name.
    ///
    /// All three parts must be present and non-empty; identifier characters
    /// are letters, digits, `_` and `$`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let parts: Vec<&str> = value.split('.').collect();
        let [database, schema, name] = parts.as_slice() else {
            return Err(ConfigError::InvalidObjectName {
                value: value.to_string(),
            });
        };

        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        };
        if !valid(database) || !valid(schema) || !valid(name) {
            return Err(ConfigError::InvalidObjectName {
                value: value.to_string(),
            });
        }

        Ok(Self {
            database: database.to_string(),
            schema: schema.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.name)
    }
}

/// Row-level error tolerance for the copy instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Skip malformed rows and keep loading.
    #[default]
    Continue,
    /// Fail the whole copy on the first malformed row.
    Abort,
}

impl OnError {
    pub fn as_str(self) -> &'static str {
        match self {
            OnError::Continue => "continue",
            OnError::Abort => "abort",
        }
    }
}

/// Options for the copy instruction.
///
/// The transfer format is fixed: comma-delimited text with optional `"`
/// quoting and one header row, matching what the staging uploader writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    pub on_error: OnError,
}

/// Result of a copy instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Rows ingested into the table.
    pub rows_loaded: u64,
    /// Malformed rows skipped under [`OnError::Continue`].
    pub rows_skipped: u64,
}

/// Narrow client seam for warehouse staging and loading.
///
/// Implementations open whatever connection they need per call; nothing is
/// pooled or reused across the batch lifecycle.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Upload a local transfer file to the named stage.
    async fn put_file(&self, local: &Path, stage: &ObjectName) -> Result<(), WarehouseError>;

    /// Copy the staged transfer file into the target table.
    async fn copy_into(
        &self,
        stage: &ObjectName,
        table: &ObjectName,
        options: &CopyOptions,
    ) -> Result<CopyOutcome, WarehouseError>;
}
