use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Get the local data directory for notibot.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("notibot");
    Ok(path)
}

/// Daemon and endpoint options, read from `config.toml` in the data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between timer-triggered polls
    pub poll_interval_secs: u64,
    /// Deadline for the fetch phase of a cycle; 0 disables it
    pub fetch_timeout_secs: u64,
    pub trello_api_url: String,
    pub grove_api_url: String,
    /// Prefix joined with an activity's link path
    pub link_base_url: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            fetch_timeout_secs: 120,
            trello_api_url: notibot_integrations::trello::DEFAULT_API_URL.to_string(),
            grove_api_url: notibot_integrations::grove::DEFAULT_API_URL.to_string(),
            link_base_url: "https://trello.com".to_string(),
        }
    }
}

impl DaemonConfig {
    pub const FILE_NAME: &'static str = "config.toml";

    /// Load from `path`, falling back to defaults when the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if config.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        Ok(config)
    }

    /// Load `config.toml` from the data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is unknown or the file is invalid
    pub fn load_default() -> Result<Self> {
        Self::load(&get_data_dir()?.join(Self::FILE_NAME))
    }

    /// Write the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_secs > 0).then(|| Duration::from_secs(self.fetch_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 300\nfetch_timeout_secs = 0\n").unwrap();

        let config = DaemonConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.fetch_timeout(), None);
        assert_eq!(config.link_base_url, "https://trello.com");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 0\n").unwrap();
        assert!(DaemonConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = DaemonConfig {
            grove_api_url: "http://localhost:8080/notice".to_string(),
            ..DaemonConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(DaemonConfig::load(&path).unwrap(), config);
    }
}
