//! External HTTP health probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;
use warden_types::ProbeOutcome;

use crate::error::{HealthError, HealthResult};

/// A single pass/fail check against something outside the supervisor.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Run the probe once. Failures are reported in the outcome, never
    /// retried within the call.
    async fn probe(&self) -> ProbeOutcome;
}

/// `GET` against a URL; success requires a 2xx within the timeout.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> HealthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HealthError::ProbeClient(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let started = Instant::now();
        let result = self.client.get(&self.url).send().await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let status = response.status();
                debug!(
                    url = %self.url,
                    status = status.as_u16(),
                    latency_ms,
                    "Health probe answered"
                );
                ProbeOutcome {
                    url: self.url.clone(),
                    success: status.is_success(),
                    status_code: Some(status.as_u16()),
                    latency_ms,
                    error: (!status.is_success()).then(|| format!("unexpected status {}", status)),
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    e.to_string()
                };
                debug!(url = %self.url, error = %error, "Health probe failed");
                ProbeOutcome {
                    url: self.url.clone(),
                    success: false,
                    status_code: None,
                    latency_ms,
                    error: Some(error),
                }
            }
        }
    }
}
