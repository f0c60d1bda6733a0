//! HTTP transport used by the request executor
//!
//! The executor never talks to `reqwest` directly. It hands an [`HttpRequest`]
//! to an [`HttpTransport`], which reports either a raw status/body pair or a
//! transport-level failure. One transport (and so one connection pool) is
//! expected to serve every call of a deployment run.

use crate::error::{Result, StackError};
use reqwest::{Method, Url};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A single outgoing request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including query
    pub url: Url,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Total timeout for the request
    pub timeout: Duration,
}

impl HttpRequest {
    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response as seen by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// Build a response from a status and a JSON document
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// Something that can execute an [`HttpRequest`]
///
/// Implementations return [`StackError::Timeout`] or
/// [`StackError::Transport`] for failures below HTTP; any status code,
/// including errors, is a successful transport call.
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send;
}

impl<T: HttpTransport> HttpTransport for Arc<T> {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        (**self).send(request)
    }
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with its own connection pool
    pub fn new(insecure: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| StackError::Transport(e.to_string()))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<HttpResponse>> + Send {
        async move {
            let target = request.url.to_string();

            let mut builder = self
                .client
                .request(request.method, request.url)
                .timeout(request.timeout);

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| classify(&target, e))?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| classify(&target, e))?;

            Ok(HttpResponse { status, body })
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> StackError {
    if err.is_timeout() {
        StackError::Timeout(format!("request to {} timed out: {}", url, err))
    } else {
        StackError::Transport(format!("request to {} failed: {}", url, err))
    }
}
