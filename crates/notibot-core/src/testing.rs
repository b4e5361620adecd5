//! In-process fakes for the source and notifier seams.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use notibot_integrations::activity::{ActionData, BoardRef, CardRef, ListRef, MemberRef};
use notibot_integrations::{ActivitySource, Notifier, RawAction, SourceCredentials};
use notibot_storage::{Database, SettingsStore};

use crate::settings::{GROVE_CHANNEL_TOKEN, TRELLO_APP_KEY, TRELLO_OAUTH_TOKEN};

/// Timestamp `secs` seconds after a fixed base instant
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

/// A `createCard` action on `board`
pub fn created(id: &str, board: &str, secs: i64) -> RawAction {
    RawAction {
        id: id.to_string(),
        action_type: "createCard".to_string(),
        date: at(secs),
        member_creator: Some(MemberRef {
            full_name: Some("Alice".to_string()),
            username: None,
        }),
        data: ActionData {
            board: Some(BoardRef {
                id: Some(board.to_string()),
                name: Some("Team".to_string()),
            }),
            card: Some(CardRef {
                id: Some(format!("card-{id}")),
                name: Some(format!("Card {id}")),
                ..CardRef::default()
            }),
            list: Some(ListRef {
                id: None,
                name: Some("To Do".to_string()),
            }),
            ..ActionData::default()
        },
    }
}

/// Database with all required credentials set
pub fn configured_store() -> Arc<Database> {
    let db = Database::open_in_memory().unwrap();
    db.upsert_many(&HashMap::from([
        (TRELLO_APP_KEY.to_string(), "key".to_string()),
        (TRELLO_OAUTH_TOKEN.to_string(), "token".to_string()),
        (GROVE_CHANNEL_TOKEN.to_string(), "chan".to_string()),
    ]))
    .unwrap();
    Arc::new(db)
}

#[derive(Default)]
pub struct FakeSource {
    pub boards: Mutex<Vec<(String, Vec<RawAction>)>>,
    pub calls: AtomicUsize,
    pub fail: Mutex<bool>,
    pub delay: Option<Duration>,
}

impl FakeSource {
    pub fn with_boards(boards: Vec<(&str, Vec<RawAction>)>) -> Self {
        Self {
            boards: Mutex::new(
                boards
                    .into_iter()
                    .map(|(id, actions)| (id.to_string(), actions))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn push(&self, board: &str, action: RawAction) {
        let mut boards = self.boards.lock().unwrap();
        if let Some((_, actions)) = boards.iter_mut().find(|(id, _)| id == board) {
            actions.push(action);
        } else {
            boards.push((board.to_string(), vec![action]));
        }
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn list_tracked_containers(
        &self,
        _credentials: &SourceCredentials,
    ) -> Result<BTreeSet<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock().unwrap() {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self
            .boards
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn fetch_activities(
        &self,
        container_id: &str,
        since: Option<DateTime<Utc>>,
        _credentials: &SourceCredentials,
    ) -> Result<Vec<RawAction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let boards = self.boards.lock().unwrap();
        let actions = boards
            .iter()
            .find(|(id, _)| id == container_id)
            .map(|(_, actions)| actions.clone())
            .unwrap_or_default();
        Ok(actions
            .into_iter()
            .filter(|a| since.map_or(true, |since| a.date > since))
            .collect())
    }

    fn system_name(&self) -> &'static str {
        "fake-source"
    }
}

/// Records every notice; fails those whose message contains `fail_on`
#[derive(Default)]
pub struct FakeNotifier {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail_on: Option<String>,
}

impl FakeNotifier {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            fail_on: Some(needle.to_string()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _, _)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, message: &str, link_url: &str, channel_token: &str) -> Result<()> {
        if self
            .fail_on
            .as_deref()
            .is_some_and(|needle| message.contains(needle))
        {
            anyhow::bail!("connection refused");
        }
        self.sent.lock().unwrap().push((
            message.to_string(),
            link_url.to_string(),
            channel_token.to_string(),
        ));
        Ok(())
    }

    fn system_name(&self) -> &'static str {
        "fake-notifier"
    }
}
