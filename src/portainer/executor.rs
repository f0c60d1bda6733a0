//! Retrying request executor
//!
//! Every Portainer call goes through [`RequestExecutor::execute`]: one HTTP
//! request per attempt, status classification, and a bounded retry loop with
//! a fixed wait plus random jitter between attempts.

use super::transport::{HttpRequest, HttpTransport};
use crate::error::{Result, StackError};
use rand::Rng;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Attempts per call, first try included
pub const NUMBER_OF_ATTEMPTS: u32 = 5;

/// Fixed part of the wait between attempts, in seconds
pub const FIXED_WAIT_SECS: u64 = 3;

/// Upper bound (exclusive) of the random part of the wait, in seconds
pub const MAX_JITTER_SECS: u64 = 10;

/// Total timeout of a single attempt, in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Which failures the executor retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryScope {
    /// Retry every failure, including 404 and other HTTP errors
    #[default]
    Everything,
    /// Retry transport failures only; HTTP errors surface after one attempt
    TransportOnly,
}

impl RetryScope {
    /// Whether `err` may be retried under this scope
    pub fn should_retry(&self, err: &StackError) -> bool {
        match self {
            RetryScope::Everything => true,
            RetryScope::TransportOnly => err.is_transport(),
        }
    }
}

/// Retry and timeout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per call, first try included
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub fixed_wait_secs: u64,
    /// Random wait added on top, drawn from [0, max_jitter_secs)
    pub max_jitter_secs: u64,
    /// Total timeout of one attempt
    pub timeout_secs: u64,
    /// Which failures are retried
    pub scope: RetryScope,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NUMBER_OF_ATTEMPTS,
            fixed_wait_secs: FIXED_WAIT_SECS,
            max_jitter_secs: MAX_JITTER_SECS,
            timeout_secs: REQUEST_TIMEOUT_SECS,
            scope: RetryScope::Everything,
        }
    }
}

impl RetryPolicy {
    /// Timeout applied to each attempt
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Wait before the next attempt
    pub fn next_delay(&self) -> Duration {
        let fixed = Duration::from_secs(self.fixed_wait_secs);
        let jitter_ms = self.max_jitter_secs.saturating_mul(1000);
        if jitter_ms == 0 {
            return fixed;
        }

        let jitter = rand::thread_rng().gen_range(0..jitter_ms);
        fixed + Duration::from_millis(jitter)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Issues Portainer requests with classification and retry
#[derive(Debug, Clone)]
pub struct RequestExecutor<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RequestExecutor<T> {
    /// Create an executor over a transport
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Perform a request and return its JSON body
    ///
    /// Status 200 yields the parsed body, 404 a [`StackError::Configuration`]
    /// and any other status a [`StackError::Execution`]. Failures are retried
    /// according to the policy; the last one is returned once attempts run
    /// out.
    pub async fn execute(
        &self,
        method: Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            match self.attempt(method.clone(), url, headers, body).await {
                Ok(data) => return Ok(data),
                Err(err) => {
                    if attempt >= attempts || !self.policy.scope.should_retry(&err) {
                        return Err(err);
                    }

                    let delay = self.policy.next_delay();
                    warn!(
                        "Retrying {} {} in {:.2} seconds as it raised: {} (attempt {}/{})",
                        method,
                        url,
                        delay.as_secs_f64(),
                        err,
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: Method,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let request = HttpRequest {
            method,
            url: url.clone(),
            headers: headers.to_vec(),
            body: body.cloned(),
            timeout: self.policy.timeout(),
        };

        let response = self.transport.send(request).await?;
        debug!("request received with code {}", response.status);

        match response.status {
            200 => {
                if response.body.trim().is_empty() {
                    return Ok(Value::Null);
                }
                Ok(serde_json::from_str(&response.body)?)
            }
            404 => {
                error!("could not find route in {}", url);
                Err(StackError::Configuration(format!(
                    "Could not reach Portainer app in {}: {}",
                    url, response.body
                )))
            }
            status => {
                error!("Unknown error ({}) from {}", status, url);
                Err(StackError::Execution {
                    status,
                    url: url.to_string(),
                    body: response.body,
                })
            }
        }
    }
}
