//! HTTP warehouse client.
//!
//! Talks to the warehouse's REST surface: transfer files are uploaded with
//! `PUT /api/v1/stages/{db}/{schema}/{stage}/files/{filename}` and ingested
//! with `POST /api/v1/tables/{db}/{schema}/{table}/copy`. A connection is
//! made per call; nothing is held open across the batch lifecycle.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::debug;

use super::{CopyOptions, CopyOutcome, ObjectName, WarehouseClient};
use crate::config::WarehouseConfig;
use crate::error::{
    ClientBuildSnafu, DecodeSnafu, ReadTransferSnafu, TransportSnafu, UnexpectedStatusSnafu,
    WarehouseError,
};

/// Fallback transfer filename when the local path has no usable name.
const DEFAULT_TRANSFER_NAME: &str = "transfer.csv";

/// Warehouse client over the REST statement API.
pub struct RestWarehouse {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

/// Body of the copy instruction.
#[derive(Debug, Serialize)]
struct CopyRequest {
    stage: String,
    on_error: &'static str,
    file_format: TransferFormat,
}

/// Fixed transfer-format expectation: delimited text, optional quoting,
/// one header row (what the staging uploader writes).
#[derive(Debug, Serialize)]
struct TransferFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    field_optionally_enclosed_by: char,
    skip_header: u32,
}

impl Default for TransferFormat {
    fn default() -> Self {
        Self {
            kind: "csv",
            field_optionally_enclosed_by: '"',
            skip_header: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CopyResponse {
    rows_loaded: u64,
    #[serde(default)]
    rows_skipped: u64,
}

impl RestWarehouse {
    /// Build a client from configuration.
    pub fn new(config: &WarehouseConfig) -> Result<Self, WarehouseError> {
        // One connection per call: idle connections are not kept across
        // the stage/copy lifecycle.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(0)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map a non-success status to an error, draining the body for context.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, WarehouseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        UnexpectedStatusSnafu { status, message }.fail()
    }
}

#[async_trait]
impl WarehouseClient for RestWarehouse {
    async fn put_file(&self, local: &Path, stage: &ObjectName) -> Result<(), WarehouseError> {
        let filename = local
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_TRANSFER_NAME);
        let url = format!(
            "{}/api/v1/stages/{}/{}/{}/files/{}",
            self.endpoint, stage.database, stage.schema, stage.name, filename
        );

        let body = tokio::fs::read(local).await.context(ReadTransferSnafu {
            path: local.display().to_string(),
        })?;

        debug!(url = %url, bytes = body.len(), "Uploading transfer file");

        let response = self
            .request(self.client.put(&url))
            .header(CONTENT_TYPE, "text/csv")
            .body(body)
            .send()
            .await
            .context(TransportSnafu)?;
        Self::ensure_success(response).await?;

        Ok(())
    }

    async fn copy_into(
        &self,
        stage: &ObjectName,
        table: &ObjectName,
        options: &CopyOptions,
    ) -> Result<CopyOutcome, WarehouseError> {
        let url = format!(
            "{}/api/v1/tables/{}/{}/{}/copy",
            self.endpoint, table.database, table.schema, table.name
        );
        let request = CopyRequest {
            stage: stage.to_string(),
            on_error: options.on_error.as_str(),
            file_format: TransferFormat::default(),
        };

        debug!(url = %url, stage = %stage, "Issuing copy instruction");

        let response = self
            .request(self.client.post(&url))
            .json(&request)
            .send()
            .await
            .context(TransportSnafu)?;
        let response = Self::ensure_success(response).await?;

        let copy: CopyResponse = response.json().await.context(DecodeSnafu)?;
        Ok(CopyOutcome {
            rows_loaded: copy.rows_loaded,
            rows_skipped: copy.rows_skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::OnError;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: String, token: Option<&str>) -> WarehouseConfig {
        WarehouseConfig {
            endpoint,
            auth_token: token.map(str::to_string),
            timeout_secs: 5,
            on_error: OnError::Continue,
        }
    }

    fn stage_name() -> ObjectName {
        ObjectName::parse("DB.S.STG").unwrap()
    }

    fn table_name() -> ObjectName {
        ObjectName::parse("DB.S.TBL").unwrap()
    }

    #[tokio::test]
    async fn test_put_file_uploads_body_to_stage_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/stages/DB/S/STG/files/stage_file.csv"))
            .and(body_string_contains("1,2"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let spool = TempDir::new().unwrap();
        let transfer = spool.path().join("stage_file.csv");
        std::fs::write(&transfer, "a,b\n1,2\n").unwrap();

        let warehouse = RestWarehouse::new(&test_config(server.uri(), None)).unwrap();
        warehouse.put_file(&transfer, &stage_name()).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_file_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let spool = TempDir::new().unwrap();
        let transfer = spool.path().join("stage_file.csv");
        std::fs::write(&transfer, "a,b\n").unwrap();

        let warehouse = RestWarehouse::new(&test_config(server.uri(), Some("sekrit"))).unwrap();
        warehouse.put_file(&transfer, &stage_name()).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_file_surfaces_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("stage unavailable"))
            .mount(&server)
            .await;

        let spool = TempDir::new().unwrap();
        let transfer = spool.path().join("stage_file.csv");
        std::fs::write(&transfer, "a,b\n").unwrap();

        let warehouse = RestWarehouse::new(&test_config(server.uri(), None)).unwrap();
        let err = warehouse
            .put_file(&transfer, &stage_name())
            .await
            .unwrap_err();

        match err {
            WarehouseError::UnexpectedStatus { status, message } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(message, "stage unavailable");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_file_missing_transfer_file() {
        let server = MockServer::start().await;
        let warehouse = RestWarehouse::new(&test_config(server.uri(), None)).unwrap();

        let err = warehouse
            .put_file(Path::new("/nonexistent/stage_file.csv"), &stage_name())
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::ReadTransfer { .. }));
    }

    #[tokio::test]
    async fn test_copy_into_decodes_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tables/DB/S/TBL/copy"))
            .and(body_string_contains("\"stage\":\"DB.S.STG\""))
            .and(body_string_contains("\"on_error\":\"continue\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"rows_loaded": 12, "rows_skipped": 3})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let warehouse = RestWarehouse::new(&test_config(server.uri(), None)).unwrap();
        let outcome = warehouse
            .copy_into(&stage_name(), &table_name(), &CopyOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.rows_loaded, 12);
        assert_eq!(outcome.rows_skipped, 3);
    }

    #[tokio::test]
    async fn test_copy_into_statement_rejection_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("syntax error"))
            .mount(&server)
            .await;

        let warehouse = RestWarehouse::new(&test_config(server.uri(), None)).unwrap();
        let err = warehouse
            .copy_into(&stage_name(), &table_name(), &CopyOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::UnexpectedStatus { .. }));
    }
}
