//! Shared HTTP session and the transport abstraction.
//!
//! Every network call in the crate goes through the [`Transport`] trait. The
//! production implementation is [`Session`], a `reqwest` blocking client
//! configured once from [`NetworkConfig`] (trust roots, user agent, relaxed
//! certificate validation for the legacy update server). Tests substitute an
//! in-memory transport.

use std::fs;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;
use reqwest::{Certificate, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::download::{DownloadError, DownloadResult};

/// Errors raised by a transport before a response status is available.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request timed out.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },
}

/// An inclusive byte range for a `Range` request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Value for the `Range` header, e.g. `bytes=500-1000`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// A response whose body has not been read yet.
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Trait for HTTP GET operations.
///
/// Implementations return any status the server sends; interpreting it is
/// the caller's job.
pub trait Transport: Send + Sync {
    /// Issue a GET request, optionally restricted to a byte range.
    fn get(&self, url: &str, range: Option<ByteRange>)
        -> Result<TransportResponse, TransportError>;
}

/// Network session shared by metadata requests and package downloads.
#[derive(Debug)]
pub struct Session {
    client: Client,
    timeout: Duration,
}

impl Session {
    /// Build the session from network configuration.
    ///
    /// Fails when the configured CA certificate cannot be read or parsed, or
    /// when the TLS backend rejects the configuration.
    pub fn new(config: &NetworkConfig) -> DownloadResult<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(path) = &config.ca_certificate {
            let pem = fs::read(path).map_err(|e| DownloadError::ReadFailed {
                path: path.clone(),
                source: e,
            })?;
            let certificate =
                Certificate::from_pem(&pem).map_err(|e| DownloadError::InvalidCertificate {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }
}

impl Transport for Session {
    fn get(
        &self,
        url: &str,
        range: Option<ByteRange>,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range.header_value());
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                TransportError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        debug!(url, status = %response.status(), ?range, "response received");

        Ok(TransportResponse {
            status: response.status(),
            body: Box::new(response),
        })
    }
}
