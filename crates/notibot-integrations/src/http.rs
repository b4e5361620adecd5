//! HTTP utilities shared by the Trello and Grove clients.

use std::time::Duration;

use anyhow::{Context, Result};

/// Request timeout applied to every outbound call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used by an integration
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("notibot/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Strip a trailing slash so paths can be appended with `format!`
#[must_use]
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Extension trait for `reqwest::Response` status handling.
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Ensure the response status is 2xx.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the API name, status code and response body
    /// when the status is not successful.
    async fn ensure_success(self, api_name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Split a response into `Ok(self)` on 2xx or `Err((status, body))` otherwise.
    ///
    /// For callers that report a rejection without failing.
    async fn into_rejection(self) -> std::result::Result<Self, (reqwest::StatusCode, String)>
    where
        Self: Sized;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn ensure_success(self, api_name: &str) -> Result<Self> {
        self.into_rejection().await.map_err(|(status, body)| {
            anyhow::anyhow!("{api_name} API error ({status}): {body}")
        })
    }

    async fn into_rejection(self) -> std::result::Result<Self, (reqwest::StatusCode, String)> {
        let status = self.status();
        if status.is_success() {
            return Ok(self);
        }
        let body = self.text().await.unwrap_or_default();
        Err((status, body))
    }
}
