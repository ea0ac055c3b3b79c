//! JSON-over-HTTP client shared by the embedding and generation adapters.
//!
//! Retry policy (only when `max_retries > 0`):
//! - HTTP 429 and 5xx → retry with exponential backoff (1s, 2s, 4s, … capped at 32s)
//! - other 4xx → fail immediately
//! - network errors and timeouts → retry

use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

pub(crate) struct JsonClient {
    client: reqwest::Client,
    service: &'static str,
    timeout_secs: u64,
    max_retries: u32,
}

impl JsonClient {
    pub(crate) fn new(service: &'static str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            service,
            timeout_secs,
            max_retries,
        })
    }

    /// POST `body` to `url` and return the parsed JSON response.
    ///
    /// Errors are plain messages; callers wrap them in the matching
    /// `RagError` variant.
    pub(crate) async fn post(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> std::result::Result<Value, String> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(service = self.service, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(key) = bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .map_err(|e| format!("{} returned invalid JSON: {}", self.service, e));
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let message = format!("{} API error {}: {}", self.service, status, body_text);
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(message);
                        continue;
                    }
                    return Err(message);
                }
                Err(e) if e.is_timeout() => {
                    last_err = Some(format!(
                        "{} request timed out after {}s",
                        self.service, self.timeout_secs
                    ));
                }
                Err(e) => {
                    last_err = Some(format!("{} connection error ({}): {}", self.service, url, e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", self.service)))
    }
}
