//! Staging uploader: batch serialization and stage upload.
//!
//! Serializes a normalized batch to a CSV transfer file in the local spool
//! directory, uploads it to the named warehouse stage, and then removes the
//! local file.
//!
//! Cleanup is best-effort on the success path only: when the upload fails,
//! the transfer file is deliberately left behind so the bytes that failed
//! to transmit remain inspectable. Re-running the pipeline overwrites it.

use std::path::PathBuf;
use std::sync::Arc;

use snafu::prelude::*;
use tracing::{info, warn};

use crate::error::{CreateSpoolDirSnafu, StagingError, UploadSnafu, WriteTransferSnafu};
use crate::transform::NormalizedBatch;
use crate::warehouse::{ObjectName, WarehouseClient};

/// Name of the local transfer file within the spool directory.
const TRANSFER_FILE_NAME: &str = "stage_file.csv";

/// Serializes batches and hands them to the warehouse staging mechanism.
pub struct StagingUploader {
    spool_dir: PathBuf,
    client: Arc<dyn WarehouseClient>,
}

impl StagingUploader {
    pub fn new(spool_dir: impl Into<PathBuf>, client: Arc<dyn WarehouseClient>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            client,
        }
    }

    /// Write the transfer file and upload it to `stage`.
    pub async fn stage(
        &self,
        batch: &NormalizedBatch,
        stage: &ObjectName,
    ) -> Result<(), StagingError> {
        std::fs::create_dir_all(&self.spool_dir).context(CreateSpoolDirSnafu {
            path: self.spool_dir.display().to_string(),
        })?;

        let transfer = self.spool_dir.join(TRANSFER_FILE_NAME);
        self.write_transfer_file(&transfer, batch)?;

        self.client
            .put_file(&transfer, stage)
            .await
            .context(UploadSnafu)?;

        info!(
            stage = %stage,
            rows = batch.len(),
            "Staged batch"
        );

        if let Err(e) = std::fs::remove_file(&transfer) {
            warn!(
                path = %transfer.display(),
                error = %e,
                "Failed to remove transfer file after upload"
            );
        }

        Ok(())
    }

    fn write_transfer_file(
        &self,
        path: &std::path::Path,
        batch: &NormalizedBatch,
    ) -> Result<(), StagingError> {
        let display = path.display().to_string();

        let mut writer = csv::Writer::from_path(path).context(WriteTransferSnafu {
            path: &display,
        })?;
        writer
            .write_record(&batch.header)
            .context(WriteTransferSnafu { path: &display })?;
        for record in &batch.records {
            writer
                .write_record(&record.fields)
                .context(WriteTransferSnafu { path: &display })?;
        }
        writer.flush().map_err(csv::Error::from).context(
            WriteTransferSnafu { path: &display },
        )?;

        Ok(())
    }
}
