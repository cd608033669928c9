//! HTTP implementation of the StageClient port.
//!
//! One POST per invocation against the remote judge/parser service. The
//! full response body is always read before a failure is reported, so the
//! invoker's classification policy can see error text like `WORKER_LIMIT`
//! regardless of status code.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::json;

use crate::domain::models::{Run, StageConfig};
use crate::domain::ports::{StageCallError, StageClient, StageKind};

pub struct HttpStageClient {
    http_client: ReqwestClient,
    base_url: String,
}

impl HttpStageClient {
    pub fn new(config: &StageConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(kind: StageKind, run: &Run) -> serde_json::Value {
        match kind {
            StageKind::Ingest => json!({
                "runId": run.id,
                "workspaceId": run.workspace_id,
                "logArtifact": run.log_artifact,
                "inputPayload": run.input_payload,
            }),
            StageKind::Judge => json!({
                "runId": run.id,
                "workspaceId": run.workspace_id,
                "taskDefinition": run.task_definition,
                "inputPayload": run.input_payload,
            }),
        }
    }
}

#[async_trait]
impl StageClient for HttpStageClient {
    async fn call(
        &self,
        kind: StageKind,
        run: &Run,
    ) -> Result<serde_json::Value, StageCallError> {
        let url = format!("{}/stages/{}", self.base_url, kind.as_str());
        let response = self
            .http_client
            .post(&url)
            .json(&Self::request_body(kind, run))
            .send()
            .await
            .map_err(|err| StageCallError {
                status: None,
                detail: if err.is_timeout() {
                    format!("timeout after request to {url}")
                } else {
                    err.to_string()
                },
            })?;

        let status = response.status();
        // Full body first: error text drives retry classification.
        let body = response.text().await.map_err(|err| StageCallError {
            status: Some(status.as_u16()),
            detail: format!("failed reading response body: {err}"),
        })?;

        if !status.is_success() {
            return Err(StageCallError {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        serde_json::from_str(&body).map_err(|err| StageCallError {
            status: Some(status.as_u16()),
            detail: format!("malformed response body: {err}"),
        })
    }
}
