//! Grove.io channel notices.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::http::{build_client, normalize_base_url, ResponseExt};
use crate::traits::Notifier;

/// Default Grove notice endpoint root
pub const DEFAULT_API_URL: &str = "https://grove.io/api/notice";

/// Label shown as the notice's sender
pub const SERVICE_NAME: &str = "Trello";

/// Icon shown next to every notice
pub const ICON_URL: &str = "https://trello.com/favicon.ico";

/// Form body accepted by the notice endpoint
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GroveNotice {
    pub service: String,
    pub message: String,
    pub url: String,
    pub icon_url: String,
}

impl GroveNotice {
    /// Build the notice for one rendered activity
    #[must_use]
    pub fn new(message: &str, link_url: &str) -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            message: format!("{message} \u{2014} {link_url}"),
            url: link_url.to_string(),
            icon_url: ICON_URL.to_string(),
        }
    }
}

/// Grove.io notice API client
pub struct GroveClient {
    base_url: String,
    client: reqwest::Client,
}

impl GroveClient {
    /// Create a new Grove client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            client: build_client()?,
        })
    }

    fn notice_url(&self, channel_token: &str) -> String {
        format!("{}/{channel_token}/", self.base_url)
    }
}

#[async_trait]
impl Notifier for GroveClient {
    async fn notify(&self, message: &str, link_url: &str, channel_token: &str) -> Result<()> {
        let notice = GroveNotice::new(message, link_url);

        // The token is the channel secret; keep it out of logs
        log::debug!("POST {}/<channel>/", self.base_url);

        let response = self
            .client
            .post(self.notice_url(channel_token))
            .form(&notice)
            .send()
            .await
            .context("Failed to send notice to Grove")?;

        if let Err((status, body)) = response.into_rejection().await {
            log::warn!("Grove rejected notice ({status}): {body}");
        }

        Ok(())
    }

    fn system_name(&self) -> &'static str {
        "grove"
    }
}
