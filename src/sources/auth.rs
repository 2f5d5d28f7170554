//! Session login against the upstream portal

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult, SourceError, SourceResult};

use super::transport::{BROWSER_USER_AGENT, SESSION_HEADER, UPSTREAM_ORIGIN};

const APP_USER_AGENT: &str = "Rocstar WEB/1.0.89";

/// Supplies a short-lived session token for a username/password/tenant triple
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, username: &str, password: &str, tenant_id: &str)
        -> SourceResult<String>;
}

pub struct UpstreamAuthenticator {
    client: Client,
    login_url: String,
}

impl UpstreamAuthenticator {
    pub fn new(login_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ORIGIN, HeaderValue::from_static(UPSTREAM_ORIGIN));
        headers.insert(
            REFERER,
            HeaderValue::from_static("https://stv.supportinternet.com.ar/"),
        );
        headers.insert("User-Agent-App", HeaderValue::from_static(APP_USER_AGENT));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            login_url: login_url.into(),
        })
    }
}

#[async_trait]
impl Authenticator for UpstreamAuthenticator {
    async fn login(
        &self,
        username: &str,
        password: &str,
        tenant_id: &str,
    ) -> SourceResult<String> {
        let form = [
            ("username", username),
            ("password", password),
            ("tenantId", tenant_id),
        ];

        let response = self
            .client
            .post(&self.login_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        url: self.login_url.clone(),
                    }
                } else {
                    SourceError::auth_failed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Login rejected with HTTP {}", status.as_u16());
            return Err(SourceError::auth_failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SourceError::auth_failed("Missing auth key in response headers"))?;

        info!("Obtained upstream session for tenant {}", tenant_id);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticator_builds() {
        let auth = UpstreamAuthenticator::new(
            "https://stv.supportinternet.com.ar/sb/login",
            Duration::from_secs(5),
        );
        assert!(auth.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_login_is_an_error() {
        let auth =
            UpstreamAuthenticator::new("http://127.0.0.1:9/sb/login", Duration::from_millis(500))
                .unwrap();
        assert!(auth.login("user", "pass", "1").await.is_err());
    }
}
