//! HTTP delivery with acknowledgment-on-success semantics.
//!
//! [`ReliableForwarder::forward`] POSTs one JSON document and, by default,
//! retries the same document with a fixed delay until the endpoint answers
//! 2xx. The caller acknowledges the source message only after it returns,
//! so a downstream outage stalls intake instead of losing frames.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::ForwardError;

/// Default header carrying the ingest token.
pub const DEFAULT_TOKEN_HEADER: &str = "X-WX-Token";

/// Maximum response body characters included in failure logs.
const LOG_BODY_LIMIT: usize = 300;

/// When and how often to retry a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Lower bound on the pause between attempts.
    pub const MIN_DELAY: Duration = Duration::from_millis(50);

    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub fn bounded(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            delay,
        }
    }

    /// Delay with the floor applied.
    pub fn effective_delay(&self) -> Duration {
        self.delay.max(Self::MIN_DELAY)
    }

    /// Whether another attempt may follow `attempts` failed ones.
    pub fn should_retry(&self, attempts: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts < max,
            None => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(250))
    }
}

/// Forwarder settings.
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    pub url: String,
    /// Sent in `token_header` when set and non-empty
    pub token: Option<String>,
    pub token_header: String,
    pub connect_timeout: Duration,
    /// Bound on a single attempt, including reading the response
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ForwarderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            connect_timeout: Duration::from_millis(1500),
            request_timeout: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a successful delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardReport {
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub status: u16,
    pub elapsed: Duration,
}

/// Destination for encoded documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Deliver one document. Returns only once it was accepted or the
    /// retry policy gave up.
    async fn forward(&self, document: Bytes) -> Result<ForwardReport, ForwardError>;
}

/// HTTP POST sink with fixed-delay retry.
pub struct ReliableForwarder {
    client: Client,
    config: ForwarderConfig,
    headers: HeaderMap,
}

impl ReliableForwarder {
    pub fn new(config: ForwarderConfig) -> Result<Self, ForwardError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .tcp_nodelay(true)
            .build()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let name = HeaderName::from_bytes(config.token_header.as_bytes()).map_err(|e| {
                ForwardError::InvalidHeader {
                    name: config.token_header.clone(),
                    message: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(token).map_err(|e| ForwardError::InvalidHeader {
                name: config.token_header.clone(),
                message: e.to_string(),
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            config,
            headers,
        })
    }

    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// One POST. `Ok(status)` for 2xx, otherwise a description of the failure.
    async fn attempt(&self, document: &Bytes) -> Result<u16, String> {
        let response = self
            .client
            .post(&self.config.url)
            .headers(self.headers.clone())
            .body(document.clone())
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }

        let body = response.text().await.unwrap_or_default();
        Err(format!("HTTP {}: {}", status.as_u16(), truncate_chars(&body, LOG_BODY_LIMIT)))
    }
}

#[async_trait]
impl DocumentSink for ReliableForwarder {
    #[instrument(skip(self, document), fields(url = %self.config.url, bytes = document.len()))]
    async fn forward(&self, document: Bytes) -> Result<ForwardReport, ForwardError> {
        let started = Instant::now();
        let delay = self.config.retry.effective_delay();
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            match self.attempt(&document).await {
                Ok(status) => {
                    debug!(status = status, attempts = attempts, "Document accepted");
                    return Ok(ForwardReport {
                        attempts,
                        status,
                        elapsed: started.elapsed(),
                    });
                }
                Err(error) => {
                    if !self.config.retry.should_retry(attempts) {
                        warn!(error = %error, attempts = attempts, "Forwarding failed, giving up");
                        return Err(ForwardError::Exhausted {
                            attempts,
                            last_error: error,
                        });
                    }
                    warn!(
                        error = %error,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Forwarding failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_floor() {
        let policy = RetryPolicy::unbounded(Duration::from_millis(5));
        assert_eq!(policy.effective_delay(), Duration::from_millis(50));
        assert_eq!(
            RetryPolicy::unbounded(Duration::from_millis(250)).effective_delay(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_should_retry() {
        let unbounded = RetryPolicy::default();
        assert!(unbounded.should_retry(u32::MAX - 1));

        let bounded = RetryPolicy::bounded(3, Duration::ZERO);
        assert!(bounded.should_retry(1));
        assert!(bounded.should_retry(2));
        assert!(!bounded.should_retry(3));
        assert_eq!(RetryPolicy::bounded(0, Duration::ZERO).max_attempts, Some(1));
    }

    #[test]
    fn test_invalid_token_header() {
        let mut config = ForwarderConfig::new("http://127.0.0.1:9/ingest");
        config.token = Some("secret".into());
        config.token_header = "bad header".into();
        assert!(matches!(
            ReliableForwarder::new(config),
            Err(ForwardError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("ééé", 2), "éé");
    }
}
