/// Configuration management command handlers
use std::collections::HashMap;

use anyhow::Result;
use notibot_core::settings::{self, KNOWN_KEYS, TRELLO_LATEST_DATE};
use notibot_storage::{Database, SettingsStore};
use tabled::{Table, Tabled};

use super::helpers::{local_time, mask_secret};

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

pub fn handle_config_get(key: &str) -> Result<()> {
    let db = Database::new(None)?;
    match get_config_value(&db, key)? {
        Some(v) => println!("{key} = {}", display_value(key, &v)),
        None => println!("{key} is not set"),
    }
    Ok(())
}

pub fn handle_config_set(key: &str, value: &str) -> Result<()> {
    let db = Database::new(None)?;
    set_config_value(&db, key, value)?;
    println!("Set {key} = {}", display_value(key, value.trim()));
    Ok(())
}

pub fn handle_config_list() -> Result<()> {
    let db = Database::new(None)?;
    let stored: HashMap<String, (String, String)> = db
        .list_settings()?
        .into_iter()
        .map(|s| (s.name, (s.value, local_time(s.updated_at))))
        .collect();

    let rows: Vec<SettingRow> = KNOWN_KEYS
        .iter()
        .map(|key| match stored.get(*key) {
            Some((value, updated)) => SettingRow {
                key: (*key).to_string(),
                value: display_value(key, value),
                updated: updated.clone(),
            },
            None => SettingRow {
                key: (*key).to_string(),
                value: "(not set)".to_string(),
                updated: String::new(),
            },
        })
        .collect();

    println!("Configuration:");
    println!("{}", Table::new(rows));

    let all: HashMap<String, String> = stored.into_iter().map(|(k, (v, _))| (k, v)).collect();
    let missing = settings::missing_keys(&all);
    if !missing.is_empty() {
        println!("\nMissing: {}", missing.join(", "));
        println!("Run: notibot config set <key> <value>");
    }

    Ok(())
}

fn display_value(key: &str, value: &str) -> String {
    if settings::is_secret(key) {
        mask_secret(value)
    } else {
        value.to_string()
    }
}

fn ensure_known(key: &str) -> Result<()> {
    if KNOWN_KEYS.contains(&key) {
        Ok(())
    } else {
        anyhow::bail!("Unknown key: {key}. Valid keys: {}", KNOWN_KEYS.join(", "))
    }
}

fn get_config_value(store: &dyn SettingsStore, key: &str) -> Result<Option<String>> {
    ensure_known(key)?;
    store.get(key)
}

fn set_config_value(store: &dyn SettingsStore, key: &str, value: &str) -> Result<()> {
    ensure_known(key)?;
    let value = value.trim();

    if key == TRELLO_LATEST_DATE {
        // Normalise so the stored cursor always matches what a cycle writes
        let at = settings::parse_watermark(value)?;
        let update = HashMap::from([(key.to_string(), settings::format_watermark(at))]);
        return store.upsert_many(&update);
    }

    if value.is_empty() {
        anyhow::bail!("Value for {key} must not be empty");
    }
    store.upsert_many(&HashMap::from([(key.to_string(), value.to_string())]))
}
