//! Trello activity model and classification.
//!
//! A raw Trello action is a loosely-shaped JSON object whose `data` field varies
//! with the action type. Every nested piece is modelled as an `Option` so a
//! missing field routes rendering to the generic fallback instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Raw API Types
// ============================================================================

/// Trello action as returned by `GET /boards/{id}/actions`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub member_creator: Option<MemberRef>,
    #[serde(default)]
    pub data: ActionData,
}

/// Member who performed the action
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Type-dependent payload of an action
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionData {
    #[serde(default)]
    pub board: Option<BoardRef>,
    #[serde(default)]
    pub card: Option<CardRef>,
    #[serde(default)]
    pub list: Option<ListRef>,
    #[serde(default)]
    pub list_before: Option<ListRef>,
    #[serde(default)]
    pub list_after: Option<ListRef>,
    #[serde(default)]
    pub old: Option<OldValues>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentRef>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub closed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Field values before an `updateCard` change
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OldValues {
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub id_list: Option<String>,
    #[serde(default)]
    pub list_before: Option<ListRef>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

// ============================================================================
// Activity
// ============================================================================

/// Action types that modify an existing card. `changeCard` is the name older
/// payloads used.
const CHANGE_TYPES: &[&str] = &["updateCard", "changeCard"];
const CREATE_TYPES: &[&str] = &["createCard", "createdCard"];
const COMMENT_TYPE: &str = "commentCard";
const ATTACHMENT_TYPE: &str = "addAttachmentToCard";

/// Semantic category of an activity, in rendering priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Closed,
    Moved,
    Created,
    Commented,
    Attached,
    Other,
}

/// One classified Trello action
#[derive(Debug, Clone)]
pub struct Activity {
    raw: RawAction,
}

impl From<RawAction> for Activity {
    fn from(raw: RawAction) -> Self {
        Self { raw }
    }
}

impl Activity {
    #[must_use]
    pub fn new(raw: RawAction) -> Self {
        Self { raw }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.raw.id
    }

    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.raw.action_type
    }

    #[must_use]
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.raw.date
    }

    /// Display name of the member behind the action
    #[must_use]
    pub fn actor(&self) -> &str {
        self.raw
            .member_creator
            .as_ref()
            .and_then(|m| m.full_name.as_deref().or(m.username.as_deref()))
            .unwrap_or("Someone")
    }

    /// Board name
    #[must_use]
    pub fn container(&self) -> Option<&str> {
        self.raw.data.board.as_ref().and_then(|b| b.name.as_deref())
    }

    /// Card name
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.raw.data.card.as_ref().and_then(|c| c.name.as_deref())
    }

    #[must_use]
    pub fn change_detail(&self) -> &ActionData {
        &self.raw.data
    }

    #[must_use]
    pub fn is_change(&self) -> bool {
        CHANGE_TYPES.contains(&self.action_type())
    }

    #[must_use]
    pub fn is_move(&self) -> bool {
        let data = &self.raw.data;
        self.is_change()
            && (data.list_before.is_some()
                || data
                    .old
                    .as_ref()
                    .is_some_and(|old| old.list_before.is_some() || old.id_list.is_some()))
    }

    #[must_use]
    pub fn is_create(&self) -> bool {
        CREATE_TYPES.contains(&self.action_type())
    }

    /// A change that archived the card.
    ///
    /// Trello reports archiving as `old.closed = false` with `card.closed =
    /// true`; a truthy `old.closed` is accepted as well.
    #[must_use]
    pub fn is_close(&self) -> bool {
        let Some(old_closed) = self.raw.data.old.as_ref().and_then(|old| old.closed) else {
            return false;
        };
        let now_closed = self
            .raw
            .data
            .card
            .as_ref()
            .and_then(|c| c.closed)
            .unwrap_or(false);
        self.is_change() && (old_closed || now_closed)
    }

    #[must_use]
    pub fn is_comment(&self) -> bool {
        self.action_type() == COMMENT_TYPE
    }

    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.action_type() == ATTACHMENT_TYPE
    }

    /// First matching category in priority order
    #[must_use]
    pub fn kind(&self) -> ActivityKind {
        if self.is_close() {
            ActivityKind::Closed
        } else if self.is_move() {
            ActivityKind::Moved
        } else if self.is_create() {
            ActivityKind::Created
        } else if self.is_comment() {
            ActivityKind::Commented
        } else if self.is_attachment() {
            ActivityKind::Attached
        } else {
            ActivityKind::Other
        }
    }

    /// Path of the card (or the board when no card is involved), relative to the Trello site
    #[must_use]
    pub fn link_path(&self) -> String {
        let board_id = self.raw.data.board.as_ref().and_then(|b| b.id.as_deref());
        let card_id = self.raw.data.card.as_ref().and_then(|c| c.id.as_deref());

        match (board_id, card_id) {
            (Some(board), Some(card)) => format!("/card/{board}/{card}"),
            (Some(board), None) => format!("/board/{board}"),
            (None, Some(card)) => format!("/card/{card}"),
            (None, None) => "/".to_string(),
        }
    }

    /// Render the notification sentence.
    ///
    /// Unrecognized or incomplete actions use the generic form and log a warning.
    #[must_use]
    pub fn render(&self) -> String {
        if let Some(message) = self.render_known() {
            return message;
        }

        log::warn!(
            "Unrecognized activity {} of type {:?}, using generic message",
            self.id(),
            self.action_type()
        );
        self.render_generic()
    }

    /// Render without logging; `None` when only the generic form applies
    #[must_use]
    pub fn render_known(&self) -> Option<String> {
        // Every rule is tried in priority order: an action matching a
        // higher rule but missing its fields may still render via a lower one.
        let rules: [(bool, fn(&Self) -> Option<String>); 5] = [
            (self.is_close(), Self::render_close),
            (self.is_move(), Self::render_move),
            (self.is_create(), Self::render_create),
            (self.is_comment(), Self::render_comment),
            (self.is_attachment(), Self::render_attachment),
        ];

        rules
            .iter()
            .filter(|(matches, _)| *matches)
            .find_map(|(_, render)| render(self))
    }

    fn render_generic(&self) -> String {
        format!(
            "{} {} {} ({})",
            self.actor(),
            self.action_type(),
            self.subject().unwrap_or_default(),
            self.container().unwrap_or_default()
        )
    }

    fn render_close(&self) -> Option<String> {
        let card = self.subject()?;
        let board = self.container()?;
        Some(format!(
            "{} closed card \"{card}\" ({board} board).",
            self.actor()
        ))
    }

    fn render_move(&self) -> Option<String> {
        let data = &self.raw.data;
        let card = self.subject()?;
        let board = self.container()?;
        let before = data
            .list_before
            .as_ref()
            .or_else(|| data.old.as_ref().and_then(|old| old.list_before.as_ref()))
            .and_then(|l| l.name.as_deref())?;
        let after = data.list_after.as_ref().and_then(|l| l.name.as_deref())?;
        Some(format!(
            "{} moved card \"{card}\" from \"{before}\" to \"{after}\" ({board} board).",
            self.actor()
        ))
    }

    fn render_create(&self) -> Option<String> {
        let card = self.subject()?;
        let board = self.container()?;
        let list = self.raw.data.list.as_ref().and_then(|l| l.name.as_deref())?;
        Some(format!(
            "{} created card \"{card}\" into \"{list}\" ({board} board)",
            self.actor()
        ))
    }

    fn render_comment(&self) -> Option<String> {
        let card = self.subject()?;
        let board = self.container()?;
        let text = self.raw.data.text.as_deref()?;
        Some(format!(
            "{} commented on card \"{card}\": \"{text}\" ({board} board).",
            self.actor()
        ))
    }

    fn render_attachment(&self) -> Option<String> {
        let card = self.subject()?;
        let board = self.container()?;
        let attachment = self.raw.data.attachment.as_ref()?;
        let label = attachment
            .name
            .as_deref()
            .or(attachment.url.as_deref())?;
        Some(format!(
            "{} attached \"{label}\" to card \"{card}\" ({board} board).",
            self.actor()
        ))
    }
}

#[cfg(test)]
mod tests;
