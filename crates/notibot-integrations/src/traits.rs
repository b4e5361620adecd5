use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::activity::{Activity, RawAction};

/// Credentials for the activity source, passed on every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCredentials {
    pub app_key: String,
    pub token: String,
}

impl SourceCredentials {
    #[must_use]
    pub fn new(app_key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            token: token.into(),
        }
    }
}

/// Read-only source of board activity
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// IDs of every board visible to the authenticated member
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    async fn list_tracked_containers(
        &self,
        credentials: &SourceCredentials,
    ) -> Result<BTreeSet<String>>;

    /// Actions on one board, newest window first as the API returns them.
    ///
    /// With `since`, only actions strictly after it are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be parsed
    async fn fetch_activities(
        &self,
        container_id: &str,
        since: Option<DateTime<Utc>>,
        credentials: &SourceCredentials,
    ) -> Result<Vec<RawAction>>;

    /// All new activity across every board, oldest first.
    ///
    /// Any single failed fetch fails the whole call.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error encountered
    async fn fetch_all(
        &self,
        since: Option<DateTime<Utc>>,
        credentials: &SourceCredentials,
    ) -> Result<Vec<Activity>> {
        let containers = self.list_tracked_containers(credentials).await?;
        let mut activities = Vec::new();

        for container_id in &containers {
            let raw = self
                .fetch_activities(container_id, since, credentials)
                .await?;
            log::debug!("Fetched {} action(s) from board {container_id}", raw.len());
            activities.extend(raw.into_iter().map(Activity::from));
        }

        // An action shows up on every board it touches
        let mut seen = HashSet::new();
        activities.retain(|a| seen.insert(a.id().to_string()));

        // Stable sort; ties keep fetch order
        activities.sort_by_key(Activity::occurred_at);
        Ok(activities)
    }

    /// Get the system name
    #[must_use]
    fn system_name(&self) -> &'static str;
}

/// Write-only chat destination
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post one message linking to `link_url` into the channel identified by `channel_token`.
    ///
    /// A rejected post (non-2xx) is logged and reported as success.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be sent at all
    async fn notify(&self, message: &str, link_url: &str, channel_token: &str) -> Result<()>;

    /// Get the system name
    #[must_use]
    fn system_name(&self) -> &'static str;
}
