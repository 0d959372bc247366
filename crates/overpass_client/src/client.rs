//! Multi-endpoint Overpass client with retry, backoff, and failover.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::config::RetryConfig;
use common::{Error, Result};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::types::OverpassResponse;

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so network failures (DNS/TLS/socket) are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

/// Raw HTTP outcome of one attempt, before status interpretation.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Seam between the retry logic and the wire.
///
/// Production uses [`HttpTransport`]; tests script status sequences to
/// exercise the retry and failover ordering without a network.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// POST the query to one endpoint. Must resolve to [`Error::Timeout`]
    /// when `timeout` lapses; the underlying request may keep running on
    /// the wire after that.
    async fn post_query(
        &self,
        endpoint: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

/// reqwest-backed transport posting `data=<query>` form bodies.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn post_query(
        &self,
        endpoint: &str,
        query: &str,
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let resp = self
            .client
            .post(endpoint)
            .form(&[("data", query)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout.as_millis() as u64)
                } else {
                    Error::Http(format_reqwest_error(&e))
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(TransportResponse { status, body })
    }
}

/// Outcome classification for one attempt.
enum Attempt {
    Success(OverpassResponse),
    /// 503/504 or timeout: retry the same endpoint with backoff.
    Transient(Error),
    /// Anything else: abandon this endpoint, advance to the next.
    Permanent(Error),
}

/// Client over a fixed, ordered list of interchangeable Overpass endpoints.
///
/// The order is deterministic on purpose: reproducible fallback behavior is
/// worth more than load spreading here.
#[derive(Clone)]
pub struct OverpassClient {
    endpoints: Vec<String>,
    retry: RetryConfig,
    transport: Arc<dyn QueryTransport>,
}

impl OverpassClient {
    pub fn new(endpoints: Vec<String>, retry: RetryConfig) -> Self {
        Self::with_transport(endpoints, retry, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(
        endpoints: Vec<String>,
        retry: RetryConfig,
        transport: Arc<dyn QueryTransport>,
    ) -> Self {
        Self {
            endpoints,
            retry,
            transport,
        }
    }

    /// Run `query`, walking endpoints in priority order with up to
    /// `max_retries_per_server` attempts each, and return the first
    /// successful response.
    ///
    /// Fails only when every endpoint is exhausted, with the last observed
    /// error aggregated into [`Error::AllEndpointsFailed`].
    pub async fn execute(&self, query: &str) -> Result<OverpassResponse> {
        let mut last_error: Option<Error> = None;

        for endpoint in &self.endpoints {
            for attempt in 0..self.retry.max_retries_per_server {
                let timeout = if attempt == 0 {
                    Duration::from_secs(self.retry.first_attempt_timeout_secs)
                } else {
                    Duration::from_secs(self.retry.retry_attempt_timeout_secs)
                };

                match self.attempt(endpoint, query, timeout).await {
                    Attempt::Success(resp) => {
                        debug!(
                            "query succeeded on {} (attempt {}, {} elements)",
                            endpoint,
                            attempt + 1,
                            resp.elements.len()
                        );
                        return Ok(resp);
                    }
                    Attempt::Transient(e) => {
                        warn!("transient failure on {} (attempt {}): {}", endpoint, attempt + 1, e);
                        last_error = Some(e);
                        if attempt + 1 < self.retry.max_retries_per_server {
                            let delay = self.retry.base_delay_ms * 2u64.pow(attempt);
                            sleep(Duration::from_millis(delay)).await;
                        }
                    }
                    Attempt::Permanent(e) => {
                        warn!("abandoning endpoint {}: {}", endpoint, e);
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no endpoints configured".to_string());
        Err(Error::AllEndpointsFailed { last })
    }

    async fn attempt(&self, endpoint: &str, query: &str, timeout: Duration) -> Attempt {
        match self.transport.post_query(endpoint, query, timeout).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                match serde_json::from_str::<OverpassResponse>(&resp.body) {
                    Ok(parsed) => Attempt::Success(parsed),
                    // A 200 with garbage in it will not get better on retry.
                    Err(e) => Attempt::Permanent(Error::Json(e)),
                }
            }
            Ok(resp) if resp.status == 503 || resp.status == 504 => {
                Attempt::Transient(Error::Status {
                    status: resp.status,
                    body: resp.body,
                })
            }
            Ok(resp) => Attempt::Permanent(Error::Status {
                status: resp.status,
                body: resp.body,
            }),
            Err(e @ Error::Timeout(_)) => Attempt::Transient(e),
            Err(e) => Attempt::Permanent(e),
        }
    }
}
