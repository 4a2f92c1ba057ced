//! snowdrift: a standalone tool for incrementally loading a flat CSV file
//! into a cloud warehouse table.
//!
//! Each invocation performs one run: read the checkpoint, slice newly
//! appended rows, normalize them, upload a transfer file to the stage, and
//! copy it into the table. Scheduling repeated runs is left to an external
//! invoker (cron, a workflow engine); checkpoint-based idempotence makes
//! re-invocation safe.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use snowdrift::error::PipelineError;
use snowdrift::pipeline::run_pipeline;
use snowdrift::Config;

/// Incremental CSV to warehouse loader.
#[derive(Parser, Debug)]
#[command(name = "snowdrift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("snowdrift starting");

    let config = Config::from_file(&args.config).map_err(PipelineError::from)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.path.display());
        info!("  Timestamp column: {}", config.source.timestamp_column);
        info!("  Amount column: {}", config.source.amount_column);
        info!("Stage: {}", config.stage);
        info!("Table: {}", config.table);
        info!("Checkpoint dir: {}", config.checkpoint.dir.display());
        info!("Warehouse endpoint: {}", config.warehouse.endpoint);
        info!("Configuration is valid");
        return Ok(());
    }

    let stats = run_pipeline(&config).await?;

    info!("Run completed successfully");
    info!("  Rows in source: {}", stats.rows_seen);
    info!("  Rows staged: {}", stats.rows_staged);
    info!("  Rows loaded: {}", stats.rows_loaded);
    info!("  Rows skipped by copy: {}", stats.rows_skipped);
    info!(
        "  Unparseable fields: {} timestamps, {} amounts",
        stats.unparseable_timestamps, stats.unparseable_amounts
    );
    info!("  Checkpoint: {}", stats.checkpoint);

    Ok(())
}
