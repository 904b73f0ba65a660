//! HTTP client for the upstream API with jitter and bounded retry.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use ttharvest_shared::{HarvestConfig, HarvestError, Result, RetryConfig};

use crate::routes::{Route, base_headers};

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff policy applied around a single network call.
///
/// Only transient failures (connect errors, timeouts) are retried; an HTTP
/// status failure is assumed to not self-resolve within the run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per request, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound on any backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_secs(config.base_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when attempts are exhausted.
    /// `attempt` is 1-based (1 = the attempt that just failed).
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        Some((self.base_delay.saturating_mul(factor)).min(self.max_delay))
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Thin wrapper over [`reqwest::Client`] carrying the fixed header blob,
/// the per-request timeout, and the pre-request jitter delay.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    max_jitter_ms: u64,
}

impl ApiClient {
    /// Build a client from the runtime configuration.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(base_headers())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HarvestError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_jitter_ms: config.max_jitter_ms,
        })
    }

    /// Issue one request for a route and parse the JSON body.
    ///
    /// Sleeps a random 0..max_jitter_ms before sending so a burst of
    /// concurrent tasks does not land on the API in lockstep.
    pub async fn fetch(&self, route: &Route) -> Result<Value> {
        if self.max_jitter_ms > 0 {
            let pause = rand::thread_rng().gen_range(0..=self.max_jitter_ms);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }

        let mut request = self.client.request(route.method.clone(), route.url.clone());
        if !route.params.is_empty() {
            request = request.query(&route.params);
        }
        if let Some(payload) = &route.json_payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            // Everything that fails before a status line is connection-level.
            HarvestError::Transient(format!("{}: {e}", route.url))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::HttpStatus {
                status: status.as_u16(),
                url: route.url.to_string(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            HarvestError::malformed(format!("{}: body is not JSON: {e}", route.url))
        })
    }

    /// Fetch with the retry policy applied to transient failures.
    pub async fn fetch_with_retry(&self, route: &Route, policy: &RetryPolicy) -> Result<Value> {
        let mut attempt = 1;
        loop {
            match self.fetch(route).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(url = %route.url, attempt, "request recovered after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => match policy.backoff(attempt) {
                    Some(delay) => {
                        warn!(
                            url = %route.url,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
