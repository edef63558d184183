//! Webhook sink with bounded retry.

use crate::error::{NotifyError, NotifyResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Base delay of the retry ladder.
const RETRY_BASE: Duration = Duration::from_millis(500);
/// Cap of the retry ladder.
const RETRY_CAP: Duration = Duration::from_secs(5);
/// Request timeout per attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One chat-webhook endpoint.
///
/// `post` retries failed deliveries up to `max_retry` times with exponential
/// backoff; after exhaustion the card is dropped and an error logged. The
/// caller is never blocked on delivery success.
pub struct WebhookSink {
    http: Client,
    url: String,
    max_retry: u32,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, max_retry: u32) -> NotifyResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.into(),
            max_retry,
        })
    }

    /// POST a JSON card, expecting a 2xx response.
    pub async fn post(&self, payload: &serde_json::Value) {
        let mut attempt = 0u32;
        loop {
            match self.try_post(payload).await {
                Ok(()) => {
                    debug!(attempt, "Card delivered");
                    return;
                }
                Err(err) if attempt < self.max_retry => {
                    let delay = RETRY_BASE.saturating_mul(1 << attempt).min(RETRY_CAP);
                    warn!(attempt, %err, delay_ms = delay.as_millis(), "Card delivery failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(attempt, %err, "Card delivery failed, dropping");
                    return;
                }
            }
        }
    }

    async fn try_post(&self, payload: &serde_json::Value) -> NotifyResult<()> {
        let response = self.http.post(&self.url).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_ladder_caps_at_five_seconds() {
        let delays: Vec<Duration> = (0..5u32)
            .map(|attempt| RETRY_BASE.saturating_mul(1 << attempt).min(RETRY_CAP))
            .collect();
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert_eq!(delays[4], Duration::from_secs(5));
    }
}
