//! Settings store contract.
//!
//! A flat mapping from setting name to free-form string value. Callers use it
//! for two unrelated concerns (API secrets and the polling cursor); nothing
//! here depends on which keys exist.

use std::collections::HashMap;

use anyhow::Result;

/// Persisted name/value settings
pub trait SettingsStore: Send + Sync {
    /// Load every setting as a map
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Load a single setting, `None` when the key was never written
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Insert or update every pair in `settings` as one atomic write
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; in that case no pair is stored
    fn upsert_many(&self, settings: &HashMap<String, String>) -> Result<()>;
}
