//! Setting keys and typed access to the two concerns kept in the settings
//! store: API secrets and the polling watermark.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use notibot_integrations::SourceCredentials;
use notibot_storage::SettingsStore;

use crate::error::PollError;

pub const TRELLO_APP_KEY: &str = "trello.app_key";
pub const TRELLO_OAUTH_TOKEN: &str = "trello.oauth_token";
pub const GROVE_CHANNEL_TOKEN: &str = "grove.channel_token";
pub const TRELLO_LATEST_DATE: &str = "trello.latest_date";

/// Keys that must be present before a cycle may run
pub const REQUIRED_KEYS: [&str; 3] = [TRELLO_APP_KEY, TRELLO_OAUTH_TOKEN, GROVE_CHANNEL_TOKEN];

/// Every key the application reads or writes
pub const KNOWN_KEYS: [&str; 4] = [
    TRELLO_APP_KEY,
    TRELLO_OAUTH_TOKEN,
    GROVE_CHANNEL_TOKEN,
    TRELLO_LATEST_DATE,
];

/// Whether a key holds a secret that should be masked on display
#[must_use]
pub fn is_secret(key: &str) -> bool {
    matches!(key, TRELLO_APP_KEY | TRELLO_OAUTH_TOKEN | GROVE_CHANNEL_TOKEN)
}

/// Required keys that are absent or blank in `settings`
#[must_use]
pub fn missing_keys(settings: &HashMap<String, String>) -> Vec<&'static str> {
    REQUIRED_KEYS
        .into_iter()
        .filter(|key| settings.get(*key).map_or(true, |v| v.trim().is_empty()))
        .collect()
}

/// Everything a cycle needs to talk to both services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub source: SourceCredentials,
    pub channel_token: String,
}

impl Credentials {
    /// Extract credentials from a full settings map
    ///
    /// # Errors
    ///
    /// Returns [`PollError::NotConfigured`] naming every missing key
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, PollError> {
        let missing = missing_keys(settings);
        if !missing.is_empty() {
            return Err(PollError::NotConfigured { missing });
        }

        let value = |key: &str| settings.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        Ok(Self {
            source: SourceCredentials::new(value(TRELLO_APP_KEY), value(TRELLO_OAUTH_TOKEN)),
            channel_token: value(GROVE_CHANNEL_TOKEN),
        })
    }

    /// Load credentials from the store
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a required key is missing
    pub fn load(store: &dyn SettingsStore) -> Result<Self, PollError> {
        let settings = store.get_all().map_err(PollError::Store)?;
        Self::from_settings(&settings)
    }
}

/// Format a watermark the way Trello formats action dates
#[must_use]
pub fn format_watermark(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored watermark
///
/// # Errors
///
/// Returns [`PollError::InvalidWatermark`] if the value is not RFC 3339
pub fn parse_watermark(value: &str) -> Result<DateTime<Utc>, PollError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PollError::InvalidWatermark {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Read the watermark, `None` before the first successful cycle
///
/// # Errors
///
/// Returns an error if the store fails or the stored value is malformed
pub fn load_watermark(store: &dyn SettingsStore) -> Result<Option<DateTime<Utc>>, PollError> {
    match store.get(TRELLO_LATEST_DATE).map_err(PollError::Store)? {
        Some(value) if !value.trim().is_empty() => parse_watermark(&value).map(Some),
        _ => Ok(None),
    }
}

/// Persist a new watermark
///
/// # Errors
///
/// Returns an error if the store write fails
pub fn store_watermark(store: &dyn SettingsStore, at: DateTime<Utc>) -> Result<(), PollError> {
    let update = HashMap::from([(TRELLO_LATEST_DATE.to_string(), format_watermark(at))]);
    store.upsert_many(&update).map_err(PollError::Store)
}
