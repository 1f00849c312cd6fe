//! Generic webhook delivery.

use crate::RetryPolicy;
use async_trait::async_trait;
use chainwatch_core::{AlertError, AlertSink};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct Payload<'a> {
    text: &'a str,
}

/// POSTs `{"text": <alert>}` to a URL; any 2xx counts as delivered.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    retry: RetryPolicy,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            retry,
        }
    }

    async fn post(&self, message: &str) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Payload { text: message })
            .send()
            .await
            .map_err(|e| AlertError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AlertError::Rejected(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, message: &str) -> Result<(), AlertError> {
        self.retry.run("webhook", || self.post(message)).await?;
        info!("Webhook alert sent to {}", self.url);
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
