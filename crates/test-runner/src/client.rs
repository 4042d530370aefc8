use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use testrun_core::CommandResponse;

use crate::config::RetryConfig;
use crate::error::{Result, RunnerError};
use crate::transport::CommandTransport;

#[derive(Serialize)]
struct CommandEnvelope<'a> {
    id: Uuid,
    #[serde(rename = "type")]
    command: &'a str,
    params: &'a Value,
}

/// HTTP transport to the test executor's command endpoint.
///
/// Connection failures, request timeouts and 5xx replies are retried with
/// exponential backoff; anything else is returned to the caller as-is.
pub struct HttpTransport {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, retry: RetryConfig) -> Self {
        Self {
            // Disable proxy for executor communication
            client: Client::builder()
                .no_proxy()
                .timeout(retry.request_timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            url: url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send_once(&self, command: &str, params: &Value) -> Result<CommandResponse> {
        let req = CommandEnvelope {
            id: Uuid::new_v4(),
            command,
            params,
        };

        let res = self
            .client
            .post(format!("{}/command", self.url))
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RunnerError::Timeout {
                        seconds: self.retry.request_timeout.as_secs(),
                    }
                } else {
                    RunnerError::connection(e.to_string())
                }
            })?;

        let status = res.status();
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            return Err(RunnerError::Remote {
                status: status.as_u16(),
                message: error_text,
            });
        }

        res.json::<CommandResponse>()
            .await
            .map_err(|e| RunnerError::InvalidResponse {
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn send_command(&self, command: &str, params: Value) -> Result<CommandResponse> {
        debug!("Sending {} to executor at {}", command, self.url);

        let mut attempt = 0;
        loop {
            match self.send_once(command, &params).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!("{} succeeded after {} retries", command, attempt);
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        "{} failed ({}), retrying in {:?} ({}/{})",
                        command,
                        e,
                        delay,
                        attempt + 1,
                        self.retry.max_retries
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
