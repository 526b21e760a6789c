//! Thin wrapper around the privileged cross-origin fetch capability.
//!
//! The engine never talks to `reqwest` directly: everything goes through
//! [`Transport::request`], which enforces the configured timeout and collapses
//! the many shapes a failed request can take into one tagged error.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// The three failure modes a caller must be able to tell apart.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("network failure: {0}")]
    Network(String),
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Cross-origin-capable HTTP client with a hard per-call deadline.
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    pub fn new(client: reqwest::Client, timeout_ms: u64) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue one request. No retries happen at this layer.
    ///
    /// The deadline covers connect, send, and body read together; hitting it
    /// is reported as [`TransportError::Timeout`], indistinguishable by policy
    /// from a socket-level timeout.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, String)],
        body: Option<String>,
    ) -> Result<RawResponse, TransportError> {
        let work = async {
            let mut req = match method {
                Method::Get => self.client.get(url),
                Method::Post => self.client.post(url),
            };
            for (name, value) in headers {
                req = req.header(*name, value);
            }
            if let Some(body) = body {
                req = req.body(body);
            }

            let resp = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::HttpStatus(status.as_u16()));
            }
            let body = resp
                .text()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;
            Ok(RawResponse {
                status: status.as_u16(),
                body,
            })
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => {
                if let Err(e) = &result {
                    debug!(%url, error = %e, "transport request failed");
                }
                result
            }
            Err(_) => {
                debug!(%url, timeout_ms = self.timeout.as_millis() as u64, "transport deadline hit");
                Err(TransportError::Timeout)
            }
        }
    }
}
