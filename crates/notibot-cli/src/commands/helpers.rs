//! Helper utility functions for CLI commands

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use notibot_core::DaemonConfig;

/// Safely truncate a string to a maximum number of characters (not bytes).
/// This avoids panics when slicing multi-byte UTF-8 characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Show only the first few characters of a secret
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() <= 4 {
        return "***".to_string();
    }
    format!("{}***", value.chars().take(4).collect::<String>())
}

/// Render a UTC instant in the local timezone
pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Load `config.toml` from the data directory
pub fn load_config(data_dir: &Path) -> Result<DaemonConfig> {
    DaemonConfig::load(&data_dir.join(DaemonConfig::FILE_NAME))
}
