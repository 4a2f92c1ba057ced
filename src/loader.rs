//! Table loader: warehouse-side copy from stage into the target table.

use std::sync::Arc;

use snafu::prelude::*;
use tracing::{info, warn};

use crate::error::{CopySnafu, LoadError};
use crate::warehouse::{CopyOptions, CopyOutcome, ObjectName, WarehouseClient};

/// Issues the copy instruction for a staged batch.
///
/// Malformed rows are skipped by the warehouse under the default
/// tolerance and surface in the outcome; only a connection or statement
/// failure fails the run.
pub struct TableLoader {
    client: Arc<dyn WarehouseClient>,
    options: CopyOptions,
}

impl TableLoader {
    pub fn new(client: Arc<dyn WarehouseClient>, options: CopyOptions) -> Self {
        Self { client, options }
    }

    pub async fn copy_to_table(
        &self,
        stage: &ObjectName,
        table: &ObjectName,
    ) -> Result<CopyOutcome, LoadError> {
        let outcome = self
            .client
            .copy_into(stage, table, &self.options)
            .await
            .context(CopySnafu)?;

        if outcome.rows_skipped > 0 {
            warn!(
                table = %table,
                rows_skipped = outcome.rows_skipped,
                "Copy skipped malformed rows"
            );
        }
        info!(
            table = %table,
            rows_loaded = outcome.rows_loaded,
            "Copied staged data into table"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    use crate::error::WarehouseError;
    use crate::warehouse::OnError;

    struct ScriptedClient {
        outcome: Result<CopyOutcome, ()>,
        seen_options: Mutex<Vec<OnError>>,
    }

    #[async_trait]
    impl WarehouseClient for ScriptedClient {
        async fn put_file(
            &self,
            _local: &Path,
            _stage: &ObjectName,
        ) -> Result<(), WarehouseError> {
            Ok(())
        }

        async fn copy_into(
            &self,
            _stage: &ObjectName,
            _table: &ObjectName,
            options: &CopyOptions,
        ) -> Result<CopyOutcome, WarehouseError> {
            self.seen_options.lock().unwrap().push(options.on_error);
            self.outcome
                .map_err(|_| WarehouseError::UnexpectedStatus {
                    status: reqwest::StatusCode::BAD_REQUEST,
                    message: "syntax error".to_string(),
                })
        }
    }

    fn names() -> (ObjectName, ObjectName) {
        (
            ObjectName::parse("DB.S.STG").unwrap(),
            ObjectName::parse("DB.S.TBL").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_copy_passes_configured_tolerance() {
        let client = Arc::new(ScriptedClient {
            outcome: Ok(CopyOutcome {
                rows_loaded: 5,
                rows_skipped: 0,
            }),
            seen_options: Mutex::new(Vec::new()),
        });
        let loader = TableLoader::new(
            client.clone(),
            CopyOptions {
                on_error: OnError::Abort,
            },
        );

        let (stage, table) = names();
        let outcome = loader.copy_to_table(&stage, &table).await.unwrap();

        assert_eq!(outcome.rows_loaded, 5);
        assert_eq!(client.seen_options.lock().unwrap()[0], OnError::Abort);
    }

    #[tokio::test]
    async fn test_row_level_skips_are_not_errors() {
        let client = Arc::new(ScriptedClient {
            outcome: Ok(CopyOutcome {
                rows_loaded: 8,
                rows_skipped: 2,
            }),
            seen_options: Mutex::new(Vec::new()),
        });
        let loader = TableLoader::new(client, CopyOptions::default());

        let (stage, table) = names();
        let outcome = loader.copy_to_table(&stage, &table).await.unwrap();
        assert_eq!(outcome.rows_skipped, 2);
    }

    #[tokio::test]
    async fn test_statement_rejection_is_load_error() {
        let client = Arc::new(ScriptedClient {
            outcome: Err(()),
            seen_options: Mutex::new(Vec::new()),
        });
        let loader = TableLoader::new(client, CopyOptions::default());

        let (stage, table) = names();
        let err = loader.copy_to_table(&stage, &table).await.unwrap_err();
        assert!(matches!(err, LoadError::Copy { .. }));
    }
}
