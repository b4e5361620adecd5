//! One polling cycle: read watermark, fetch new activity, notify, advance
//! the watermark.
//!
//! Delivery is at-least-once. The watermark is written after every notice
//! has been attempted, so a crash mid-cycle replays activity on the next run
//! instead of losing it. Rejected notices do not hold the watermark back.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use notibot_integrations::{Activity, ActivitySource, GroveClient, Notifier, TrelloClient};
use notibot_storage::SettingsStore;

use crate::config::DaemonConfig;
use crate::error::PollError;
use crate::settings::{self, Credentials};

/// Outcome of a completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub delivered: usize,
    pub failures: Vec<String>,
    /// Watermark written by this cycle, `None` when nothing was new
    pub watermark: Option<DateTime<Utc>>,
}

impl CycleReport {
    #[must_use]
    pub fn new(fetched: usize) -> Self {
        Self {
            fetched,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.delivered += 1;
    }

    pub fn record_failure(&mut self, error: String) {
        self.failures.push(error);
    }

    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty() && self.delivered == self.fetched
    }
}

/// A rendered notice that a dry run would have sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    pub occurred_at: DateTime<Utc>,
    pub message: String,
    pub link_url: String,
}

/// Runs polling cycles against a source, a notifier and a settings store
pub struct Poller {
    store: Arc<dyn SettingsStore>,
    source: Arc<dyn ActivitySource>,
    notifier: Arc<dyn Notifier>,
    link_base_url: String,
    fetch_timeout: Option<Duration>,
}

impl Poller {
    #[must_use]
    pub fn new(
        store: Arc<dyn SettingsStore>,
        source: Arc<dyn ActivitySource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            link_base_url: DaemonConfig::default().link_base_url,
            fetch_timeout: None,
        }
    }

    /// Build a poller talking to Trello and Grove as configured
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be created
    pub fn from_config(store: Arc<dyn SettingsStore>, config: &DaemonConfig) -> Result<Self> {
        let source = TrelloClient::new(Some(config.trello_api_url.clone()))?;
        let notifier = GroveClient::new(Some(config.grove_api_url.clone()))?;

        Ok(Self::new(store, Arc::new(source), Arc::new(notifier))
            .with_link_base_url(&config.link_base_url)
            .with_fetch_timeout(config.fetch_timeout()))
    }

    #[must_use]
    pub fn with_link_base_url(mut self, link_base_url: &str) -> Self {
        self.link_base_url = link_base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, fetch_timeout: Option<Duration>) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    fn link_url(&self, activity: &Activity) -> String {
        format!("{}{}", self.link_base_url, activity.link_path())
    }

    async fn fetch(
        &self,
        credentials: &Credentials,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Activity>, PollError> {
        let fetch = self.source.fetch_all(since, &credentials.source);

        let result = match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch)
                .await
                .map_err(|_| PollError::DeadlineExceeded(limit))?,
            None => fetch.await,
        };

        result.map_err(PollError::SourceFetchFailed)
    }

    /// Load credentials and watermark, then fetch everything newer
    async fn collect(&self) -> Result<(Credentials, Option<DateTime<Utc>>, Vec<Activity>), PollError> {
        let credentials = Credentials::load(self.store.as_ref())?;
        let since = settings::load_watermark(self.store.as_ref())?;

        log::debug!(
            "Polling {} since {}",
            self.source.system_name(),
            since.map_or_else(|| "the beginning".to_string(), settings::format_watermark)
        );

        let activities = self.fetch(&credentials, since).await?;
        Ok((credentials, since, activities))
    }

    /// Run one full cycle
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is incomplete, the watermark is
    /// invalid, fetching fails or times out, or the store cannot be written.
    /// The watermark is unchanged in every error case except a failed final write.
    pub async fn run_cycle(&self) -> Result<CycleReport, PollError> {
        let (credentials, since, activities) = self.collect().await?;

        let Some(newest) = activities.iter().map(Activity::occurred_at).max() else {
            log::info!("No new activity");
            return Ok(CycleReport::default());
        };
        // Never move backwards, even if the source returns stale records
        let watermark = since.map_or(newest, |since| since.max(newest));

        let mut report = CycleReport::new(activities.len());
        for activity in &activities {
            let message = activity.render();
            let link_url = self.link_url(activity);

            match self
                .notifier
                .notify(&message, &link_url, &credentials.channel_token)
                .await
            {
                Ok(()) => report.record_success(),
                Err(e) => {
                    log::warn!(
                        "Failed to deliver activity {} via {}: {e:#}",
                        activity.id(),
                        self.notifier.system_name()
                    );
                    report.record_failure(format!("{}: {e:#}", activity.id()));
                }
            }
        }

        settings::store_watermark(self.store.as_ref(), watermark)?;
        report.watermark = Some(watermark);

        log::info!(
            "Cycle complete: {} activity, {} delivered, {} failed, watermark {}",
            report.fetched,
            report.delivered,
            report.failures.len(),
            settings::format_watermark(watermark)
        );
        Ok(report)
    }

    /// Fetch and render new activity without notifying or moving the watermark
    ///
    /// # Errors
    ///
    /// Same as [`Poller::run_cycle`] up to and including the fetch
    pub async fn preview(&self) -> Result<Vec<PreviewItem>, PollError> {
        let (_, _, activities) = self.collect().await?;

        Ok(activities
            .iter()
            .map(|activity| PreviewItem {
                occurred_at: activity.occurred_at(),
                message: activity.render(),
                link_url: self.link_url(activity),
            })
            .collect())
    }
}
