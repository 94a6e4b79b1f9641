// src/api.rs

use crate::config;
use crate::error::{Result, SinkError};
use crate::models::{GetLogsResponse, LogUsageRequest, LogUsageResponse};
use serde::Deserialize;
use tracing::{debug, instrument};

/// The two backend operations the client views depend on.
#[allow(async_fn_in_trait)]
pub trait LogApi {
    async fn submit_log(&self, request: &LogUsageRequest) -> Result<LogUsageResponse>;
    async fn fetch_logs(&self) -> Result<GetLogsResponse>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for `POST {base}/log_usage` and `GET {base}/get_logs`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config::normalize_base(&base_url.into()),
        }
    }

    /// 使用环境变量或默认的 `/api`
    pub fn from_env() -> Self {
        Self::new(config::resolve_api_base(None))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn status_message(status: reqwest::StatusCode) -> String {
    format!("HTTP error! status: {}", status.as_u16())
}

impl LogApi for ApiClient {
    #[instrument(skip(self, request), fields(actor = %request.name, tableware = %request.tableware))]
    async fn submit_log(&self, request: &LogUsageRequest) -> Result<LogUsageResponse> {
        debug!("Sending log entry");
        let response = self
            .http
            .post(self.url("log_usage"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // 没有 body 或者不是 JSON 时退回到状态码
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status_message(status));
            return Err(SinkError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[instrument(skip(self))]
    async fn fetch_logs(&self) -> Result<GetLogsResponse> {
        let response = self.http.get(self.url("get_logs")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Api {
                status: status.as_u16(),
                message: status_message(status),
            });
        }

        let body = response.bytes().await?;
        let logs: GetLogsResponse = serde_json::from_slice(&body)?;
        debug!("Fetched {} records", logs.records.len());
        Ok(logs)
    }
}
