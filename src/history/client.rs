//! HTTP client for the SWF JSON API.
//!
//! Requests are sent unsigned. Point the endpoint at a signing proxy or a
//! local emulator; credentials are outside this crate's concern.

use super::HistorySource;
use crate::error::{HistoryError, Result};
use crate::models::HistoryPage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TARGET_GET_HISTORY: &str = "SimpleWorkflowService.GetWorkflowExecutionHistory";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Configuration for [`SwfClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service endpoint, e.g. `https://swf.us-east-1.amazonaws.com`.
    pub endpoint: String,
    pub timeout_seconds: u64,
    /// `maximumPageSize` sent with each request; service default when `None`.
    pub page_size: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            timeout_seconds: 60,
            page_size: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetHistoryRequest<'a> {
    domain: &'a str,
    execution: ExecutionRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    maximum_page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionRef<'a> {
    workflow_id: &'a str,
    run_id: &'a str,
}

/// Error body returned by the service on non-2xx replies.
#[derive(Debug, Default, Deserialize)]
struct ServiceFault {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Workflow service client speaking the JSON 1.0 protocol.
pub struct SwfClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl SwfClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn fetch_page(
        &self,
        domain: &str,
        run_id: &str,
        workflow_id: &str,
        next_page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        let request = GetHistoryRequest {
            domain,
            execution: ExecutionRef {
                workflow_id,
                run_id,
            },
            next_page_token,
            maximum_page_size: self.config.page_size,
        };
        let body = serde_json::to_vec(&request)?;

        debug!(
            "POST {} {} (token: {})",
            self.config.endpoint,
            TARGET_GET_HISTORY,
            next_page_token.is_some()
        );

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .header("X-Amz-Target", TARGET_GET_HISTORY)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &bytes));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl HistorySource for SwfClient {
    type Error = HistoryError;

    async fn get_workflow_execution_history(
        &self,
        domain: &str,
        run_id: &str,
        workflow_id: &str,
        next_page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        self.fetch_page(domain, run_id, workflow_id, next_page_token)
            .await
    }
}

/// Build a [`HistoryError::Service`] from an error reply.
fn service_error(status: u16, body: &[u8]) -> HistoryError {
    let fault: ServiceFault = serde_json::from_slice(body).unwrap_or_default();

    // "com.amazonaws.swf.base.model#UnknownResourceFault" -> "UnknownResourceFault"
    let kind = fault
        .kind
        .as_deref()
        .map(|k| k.rsplit('#').next().unwrap_or(k).to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let message = fault
        .message
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    HistoryError::Service {
        status,
        kind,
        message,
    }
}
