//! snowdrift: incremental CSV to warehouse loader.
//!
//! This library provides components for detecting newly appended rows in a
//! flat CSV source, normalizing their timestamp and amount fields, staging
//! them as a transfer file in the warehouse, and copying the staged batch
//! into a target table, with checkpoint-based recovery so re-runs never
//! reprocess rows already loaded.
//!
//! # Example
//!
//! ```ignore
//! use snowdrift::{Config, run_pipeline, error::PipelineError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PipelineError> {
//!     let config = Config::from_file("config.yaml".as_ref())?;
//!     let stats = run_pipeline(&config).await?;
//!     println!("Loaded {} rows", stats.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod source;
pub mod staging;
pub mod transform;
pub mod warehouse;

// Re-export main types
pub use config::Config;
pub use error::PipelineError;
pub use pipeline::{Pipeline, RunStats, run_pipeline};
