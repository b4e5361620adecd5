use chrono::{DateTime, Utc};

/// One persisted name/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
