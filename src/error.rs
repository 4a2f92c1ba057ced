//! Error types for the snowdrift incremental loader.

use snafu::prelude::*;

/// Errors that can occur while reading the source file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExtractError {
    /// Failed to open the source file.
    #[snafu(display("Failed to open source file {path}: {source}"))]
    OpenSource {
        path: String,
        source: std::io::Error,
    },

    /// Source file is structurally malformed.
    #[snafu(display("Failed to read source file {path}: {source}"))]
    ReadSource { path: String, source: csv::Error },
}

/// Errors that can occur during field normalization.
///
/// Value-level malformation (an unparseable timestamp or amount in a single
/// row) is never an error; affected fields are coerced to the unparseable
/// marker instead. Only structural problems abort the transform.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TransformError {
    /// An expected column is absent from the source header.
    #[snafu(display("Source header is missing expected column '{column}'"))]
    MissingColumn { column: String },
}

/// Errors that can occur while talking to the warehouse.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WarehouseError {
    /// Request could not be sent (connection, timeout, DNS).
    #[snafu(display("Warehouse request failed: {source}"))]
    Transport { source: reqwest::Error },

    /// Warehouse answered with a non-success status.
    #[snafu(display("Warehouse rejected the request ({status}): {message}"))]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        message: String,
    },

    /// Warehouse response body could not be decoded.
    #[snafu(display("Failed to decode warehouse response: {source}"))]
    Decode { source: reqwest::Error },

    /// Failed to read the local transfer file for upload.
    #[snafu(display("Failed to read transfer file {path}: {source}"))]
    ReadTransfer {
        path: String,
        source: std::io::Error,
    },

    /// HTTP client could not be constructed.
    #[snafu(display("Failed to build warehouse HTTP client: {source}"))]
    ClientBuild { source: reqwest::Error },
}

/// Errors that can occur while staging a batch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StagingError {
    /// Failed to create the spool directory.
    #[snafu(display("Failed to create spool directory {path}: {source}"))]
    CreateSpoolDir {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write the local transfer file.
    #[snafu(display("Failed to write transfer file {path}: {source}"))]
    WriteTransfer { path: String, source: csv::Error },

    /// Upload to the warehouse stage failed.
    ///
    /// The local transfer file is intentionally left behind on this path;
    /// see `StagingUploader` for the cleanup contract.
    #[snafu(display("Failed to upload transfer file to stage: {source}"))]
    Upload { source: WarehouseError },
}

/// Errors that can occur while copying staged data into the table.
///
/// Row-level skips tolerated by the copy are reported in `CopyOutcome`,
/// not here. Only connection or statement-level rejection is fatal.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LoadError {
    /// The copy instruction failed at the connection or statement level.
    #[snafu(display("Copy into table failed: {source}"))]
    Copy { source: WarehouseError },
}

/// Errors that can occur while persisting the checkpoint.
///
/// Checkpoint *reads* never fail: absent or corrupt state defaults to 0
/// with a warning.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    /// Failed to create the checkpoint directory.
    #[snafu(display("Failed to create checkpoint directory {path}: {source}"))]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Failed to write the checkpoint temp file.
    #[snafu(display("Failed to write checkpoint {path}: {source}"))]
    WriteState {
        path: String,
        source: std::io::Error,
    },

    /// Failed to rename the temp file over the checkpoint.
    #[snafu(display("Failed to commit checkpoint {path}: {source}"))]
    Commit {
        path: String,
        source: std::io::Error,
    },
}

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse the YAML configuration.
    #[snafu(display("Failed to parse YAML configuration: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Warehouse endpoint is empty.
    #[snafu(display("Warehouse endpoint cannot be empty"))]
    EmptyEndpoint,

    /// A stage or table name is not a valid qualified name.
    #[snafu(display(
        "'{value}' is not a valid qualified name (expected <database>.<schema>.<name>)"
    ))]
    InvalidObjectName { value: String },
}

/// Top-level pipeline errors, one variant per phase.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Extraction error.
    #[snafu(display("Extraction error: {source}"))]
    Extract { source: ExtractError },

    /// Transform error.
    #[snafu(display("Transform error: {source}"))]
    Transform { source: TransformError },

    /// Staging error.
    #[snafu(display("Staging error: {source}"))]
    Staging { source: StagingError },

    /// Load error.
    #[snafu(display("Load error: {source}"))]
    Load { source: LoadError },

    /// Checkpoint write error.
    #[snafu(display("Checkpoint error: {source}"))]
    Checkpoint { source: CheckpointError },

    /// Warehouse client could not be constructed.
    #[snafu(display("Warehouse client error: {source}"))]
    Warehouse { source: WarehouseError },
}

impl PipelineError {
    /// Whether a re-invocation can reasonably be expected to succeed.
    ///
    /// Staging, load, and checkpoint failures are transient warehouse or
    /// filesystem conditions; the checkpoint was not advanced (or the data
    /// is already loaded, for checkpoint failures), so re-running is safe.
    /// Extraction, transform, and config failures need operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Staging { .. }
                | PipelineError::Load { .. }
                | PipelineError::Checkpoint { .. }
        )
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(source: ExtractError) -> Self {
        PipelineError::Extract { source }
    }
}

impl From<TransformError> for PipelineError {
    fn from(source: TransformError) -> Self {
        PipelineError::Transform { source }
    }
}

impl From<StagingError> for PipelineError {
    fn from(source: StagingError) -> Self {
        PipelineError::Staging { source }
    }
}

impl From<LoadError> for PipelineError {
    fn from(source: LoadError) -> Self {
        PipelineError::Load { source }
    }
}

impl From<CheckpointError> for PipelineError {
    fn from(source: CheckpointError) -> Self {
        PipelineError::Checkpoint { source }
    }
}
