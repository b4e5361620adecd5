use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::RawAction;
use crate::http::{build_client, normalize_base_url, ResponseExt};
use crate::traits::{ActivitySource, SourceCredentials};

/// Default Trello REST API root
pub const DEFAULT_API_URL: &str = "https://api.trello.com/1";

/// Largest page the actions endpoint accepts
pub const MAX_PAGE_LIMIT: usize = 1000;

// ============================================================================
// API Response Types
// ============================================================================

/// Trello board summary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrelloBoard {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

// ============================================================================
// Trello Client
// ============================================================================

/// Trello REST API client
pub struct TrelloClient {
    base_url: String,
    client: reqwest::Client,
    page_limit: usize,
}

impl TrelloClient {
    /// Create a new Trello client
    ///
    /// # Arguments
    /// * `base_url` - Optional API root, defaults to [`DEFAULT_API_URL`]
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            base_url: normalize_base_url(&base_url),
            client: build_client()?,
            page_limit: MAX_PAGE_LIMIT,
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Make an authenticated GET request
    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        credentials: &SourceCredentials,
    ) -> Result<T> {
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .query(&[
                ("key", credentials.app_key.as_str()),
                ("token", credentials.token.as_str()),
            ])
            .query(query)
            .send()
            .await
            .context("Failed to send request to Trello API")?
            .ensure_success("Trello")
            .await?;

        response
            .json()
            .await
            .context("Failed to parse Trello API response")
    }

    /// List open boards of the authenticated member
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails
    pub async fn list_boards(&self, credentials: &SourceCredentials) -> Result<Vec<TrelloBoard>> {
        let url = self.build_url("members/me/boards");
        self.get(&url, &[("filter", "open"), ("fields", "id,name")], credentials)
            .await
    }

    /// Page size used when catching up from a watermark
    #[must_use]
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// List actions on a board, optionally only those after `since`.
    ///
    /// Without `since`, one request returns the API's default recent window.
    /// With `since`, pages are walked backwards with `before=<oldest id>`
    /// until a short page or one reaching back to `since`, so a busy board
    /// never loses actions between two polls.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails
    pub async fn list_actions(
        &self,
        board_id: &str,
        since: Option<DateTime<Utc>>,
        credentials: &SourceCredentials,
    ) -> Result<Vec<RawAction>> {
        let url = self.build_url(&format!("boards/{board_id}/actions"));

        let Some(since) = since else {
            return self.get(&url, &[], credentials).await;
        };

        let since_param = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let limit = self.page_limit.to_string();
        let mut before: Option<String> = None;
        let mut actions: Vec<RawAction> = Vec::new();

        loop {
            let mut query = vec![("since", since_param.as_str()), ("limit", limit.as_str())];
            if let Some(before) = before.as_deref() {
                query.push(("before", before));
            }

            let page: Vec<RawAction> = self.get(&url, &query, credentials).await?;
            let full = page.len() >= self.page_limit;
            let oldest = page
                .iter()
                .min_by_key(|a| a.date)
                .map(|a| (a.id.clone(), a.date));
            actions.extend(page);

            match oldest {
                Some((id, date)) if full && date > since => {
                    if before.as_deref() == Some(id.as_str()) {
                        log::warn!("Trello ignored before={id} on board {board_id}, stopping");
                        break;
                    }
                    log::debug!("Board {board_id} has more than one page of actions, continuing before {id}");
                    before = Some(id);
                }
                _ => break,
            }
        }

        // The API's `since` bound is not strict
        actions.retain(|a| a.date > since);
        Ok(actions)
    }
}

#[async_trait]
impl ActivitySource for TrelloClient {
    async fn list_tracked_containers(
        &self,
        credentials: &SourceCredentials,
    ) -> Result<BTreeSet<String>> {
        let boards = self.list_boards(credentials).await?;
        Ok(boards.into_iter().map(|b| b.id).collect())
    }

    async fn fetch_activities(
        &self,
        container_id: &str,
        since: Option<DateTime<Utc>>,
        credentials: &SourceCredentials,
    ) -> Result<Vec<RawAction>> {
        self.list_actions(container_id, since, credentials)
            .await
            .with_context(|| format!("Failed to fetch actions for board {container_id}"))
    }

    fn system_name(&self) -> &'static str {
        "trello"
    }
}

// ============================================================================
// Tests
// ============================================================================
