//! Poll cycle failures.

use std::time::Duration;

use thiserror::Error;

/// Why a polling cycle did not complete.
///
/// Delivery failures and unrecognized activity types are not errors: the
/// former are counted in the cycle report, the latter render generically.
#[derive(Debug, Error)]
pub enum PollError {
    /// One or more required settings are missing or blank; nothing was fetched
    #[error("not configured: missing {}", .missing.join(", "))]
    NotConfigured { missing: Vec<&'static str> },

    /// The activity source failed; the watermark was left unchanged
    #[error("activity fetch failed: {0:#}")]
    SourceFetchFailed(anyhow::Error),

    /// Fetching took longer than the configured deadline
    #[error("activity fetch exceeded deadline of {}s", .0.as_secs())]
    DeadlineExceeded(Duration),

    /// The stored watermark could not be parsed
    #[error("invalid watermark {value:?}: {reason}")]
    InvalidWatermark { value: String, reason: String },

    /// Reading or writing the settings store failed
    #[error("settings store error: {0:#}")]
    Store(anyhow::Error),
}

impl PollError {
    /// Whether a later cycle can succeed without operator action
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SourceFetchFailed(_) | Self::DeadlineExceeded(_) | Self::Store(_)
        )
    }
}
