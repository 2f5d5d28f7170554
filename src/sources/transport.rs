//! HTTP transport used to talk to mirrors
//!
//! The fetcher only needs "GET this URL and tell me the status and body", so
//! the network sits behind [`MirrorTransport`] and can be swapped for a
//! scripted implementation in tests.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::errors::{AppError, AppResult};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36";
pub const UPSTREAM_ORIGIN: &str = "https://stv.supportinternet.com.ar";
pub const SESSION_HEADER: &str = "x-session-id";

/// Raw response from a mirror
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Connect(String),
}

#[async_trait]
pub trait MirrorTransport: Send + Sync {
    /// Issue a GET. `session_token` is forwarded as `X-Session-Id` when set.
    async fn get(
        &self,
        url: &str,
        session_token: Option<&str>,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport; the client timeout bounds every request
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ORIGIN, HeaderValue::from_static(UPSTREAM_ORIGIN));
        headers.insert(
            REFERER,
            HeaderValue::from_static("https://stv.supportinternet.com.ar/"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MirrorTransport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        session_token: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(token) = session_token {
            request = request.header(SESSION_HEADER, token);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = TransportResponse {
            status: 204,
            body: String::new(),
        };
        let bad = TransportResponse {
            status: 503,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }

    #[test]
    fn test_http_transport_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
