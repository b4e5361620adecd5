use std::cell::RefCell;
use std::sync::Once;

use serde_json::json;

use super::*;

// ============================================================================
// Log capture
// ============================================================================

thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Records log output per test thread so counts don't leak between tests
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with(|c| {
            c.borrow_mut()
                .push((record.level(), record.args().to_string()));
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

fn capture_logs() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
}

fn captured_warnings() -> Vec<String> {
    CAPTURED.with(|c| {
        c.borrow()
            .iter()
            .filter(|(level, _)| *level == log::Level::Warn)
            .map(|(_, message)| message.clone())
            .collect()
    })
}

// ============================================================================
// Fixtures
// ============================================================================

fn activity(value: serde_json::Value) -> Activity {
    Activity::new(serde_json::from_value(value).unwrap())
}

fn base(action_type: &str, data: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "a1",
        "type": action_type,
        "date": "2024-03-01T10:00:00.000Z",
        "memberCreator": { "fullName": "Alice", "username": "alice" },
        "data": data
    })
}

fn board_and_card() -> serde_json::Value {
    json!({
        "board": { "id": "b1", "name": "Team" },
        "card": { "id": "c1", "name": "Fix bug" }
    })
}

fn with(mut data: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    let map = data.as_object_mut().unwrap();
    for (key, value) in extra.as_object().unwrap() {
        map.insert(key.clone(), value.clone());
    }
    data
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_render_create() {
    let a = activity(base(
        "createdCard",
        with(board_and_card(), json!({ "list": { "name": "To Do" } })),
    ));

    assert!(a.is_create());
    assert_eq!(a.kind(), ActivityKind::Created);
    assert_eq!(
        a.render(),
        "Alice created card \"Fix bug\" into \"To Do\" (Team board)"
    );
}

#[test]
fn test_render_create_trello_type() {
    let a = activity(base(
        "createCard",
        with(board_and_card(), json!({ "list": { "name": "Backlog" } })),
    ));
    assert_eq!(
        a.render(),
        "Alice created card \"Fix bug\" into \"Backlog\" (Team board)"
    );
}

#[test]
fn test_render_move_with_list_before_under_old() {
    let a = activity(base(
        "changeCard",
        with(
            board_and_card(),
            json!({
                "old": { "listBefore": { "name": "To Do" } },
                "listAfter": { "name": "Done" }
            }),
        ),
    ));

    assert!(a.is_change());
    assert!(a.is_move());
    assert!(!a.is_close());
    assert_eq!(
        a.render(),
        "Alice moved card \"Fix bug\" from \"To Do\" to \"Done\" (Team board)."
    );
}

#[test]
fn test_render_move_trello_payload() {
    let a = activity(base(
        "updateCard",
        with(
            board_and_card(),
            json!({
                "old": { "idList": "l1" },
                "listBefore": { "id": "l1", "name": "Doing" },
                "listAfter": { "id": "l2", "name": "Review" }
            }),
        ),
    ));
    assert_eq!(
        a.render(),
        "Alice moved card \"Fix bug\" from \"Doing\" to \"Review\" (Team board)."
    );
}

#[test]
fn test_render_close() {
    let a = activity(base(
        "updateCard",
        with(board_and_card(), json!({ "old": { "closed": true } })),
    ));
    assert_eq!(a.kind(), ActivityKind::Closed);
    assert_eq!(a.render(), "Alice closed card \"Fix bug\" (Team board).");
}

#[test]
fn test_trello_archive_payload_is_close() {
    let a = activity(base(
        "updateCard",
        json!({
            "board": { "id": "b1", "name": "Team" },
            "card": { "id": "c1", "name": "Fix bug", "closed": true },
            "old": { "closed": false }
        }),
    ));
    assert!(a.is_close());
    assert_eq!(a.render(), "Alice closed card \"Fix bug\" (Team board).");
}

#[test]
fn test_close_wins_over_move() {
    let a = activity(base(
        "updateCard",
        with(
            board_and_card(),
            json!({
                "old": { "closed": true, "listBefore": { "name": "To Do" } },
                "listAfter": { "name": "Done" }
            }),
        ),
    ));

    assert!(a.is_close());
    assert!(a.is_move());
    assert_eq!(a.render(), "Alice closed card \"Fix bug\" (Team board).");
}

#[test]
fn test_close_requires_change_type() {
    let a = activity(base(
        "commentCard",
        with(
            board_and_card(),
            json!({ "old": { "closed": true }, "text": "done?" }),
        ),
    ));
    assert!(!a.is_close());
    assert_eq!(
        a.render(),
        "Alice commented on card \"Fix bug\": \"done?\" (Team board)."
    );
}

#[test]
fn test_render_attachment_prefers_name() {
    let a = activity(base(
        "addAttachmentToCard",
        with(
            board_and_card(),
            json!({ "attachment": { "name": "log.txt", "url": "https://x/log.txt" } }),
        ),
    ));
    assert_eq!(
        a.render(),
        "Alice attached \"log.txt\" to card \"Fix bug\" (Team board)."
    );
}

#[test]
fn test_render_attachment_falls_back_to_url() {
    let a = activity(base(
        "addAttachmentToCard",
        with(
            board_and_card(),
            json!({ "attachment": { "url": "https://x/log.txt" } }),
        ),
    ));
    assert_eq!(
        a.render(),
        "Alice attached \"https://x/log.txt\" to card \"Fix bug\" (Team board)."
    );
}

#[test]
fn test_unknown_type_renders_generic_with_one_warning() {
    capture_logs();
    let a = activity(base("voteOnCard", board_and_card()));

    assert_eq!(a.kind(), ActivityKind::Other);
    assert_eq!(a.render(), "Alice voteOnCard Fix bug (Team)");

    let warnings = captured_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("voteOnCard"));
}

#[test]
fn test_known_type_logs_nothing() {
    capture_logs();
    let a = activity(base(
        "createCard",
        with(board_and_card(), json!({ "list": { "name": "To Do" } })),
    ));
    let _ = a.render();
    assert!(captured_warnings().is_empty());
}

#[test]
fn test_incomplete_create_falls_back_to_generic() {
    capture_logs();
    // createCard without the list it was created in
    let a = activity(base("createCard", board_and_card()));

    assert!(a.is_create());
    assert_eq!(a.render_known(), None);
    assert_eq!(a.render(), "Alice createCard Fix bug (Team)");
    assert_eq!(captured_warnings().len(), 1);
}

#[test]
fn test_move_missing_list_after_is_generic() {
    let a = activity(base(
        "updateCard",
        with(board_and_card(), json!({ "old": { "idList": "l1" } })),
    ));
    assert!(a.is_move());
    assert_eq!(a.render(), "Alice updateCard Fix bug (Team)");
}

#[test]
fn test_missing_everything_does_not_panic() {
    let a = activity(json!({
        "id": "a2",
        "type": "updateCard",
        "date": "2024-03-01T10:00:00Z"
    }));

    assert_eq!(a.actor(), "Someone");
    assert_eq!(a.container(), None);
    assert_eq!(a.subject(), None);
    assert_eq!(a.link_path(), "/");
    assert_eq!(a.render(), "Someone updateCard  ()");
}

#[test]
fn test_actor_falls_back_to_username() {
    let a = activity(json!({
        "id": "a3",
        "type": "voteOnCard",
        "date": "2024-03-01T10:00:00Z",
        "memberCreator": { "username": "bob" }
    }));
    assert_eq!(a.actor(), "bob");
}

#[test]
fn test_render_is_repeatable() {
    let a = activity(base(
        "updateCard",
        with(
            board_and_card(),
            json!({
                "listBefore": { "name": "A" },
                "listAfter": { "name": "B" }
            }),
        ),
    ));
    assert_eq!(a.render(), a.render());
}

#[test]
fn test_link_path() {
    let card = activity(base("createCard", board_and_card()));
    assert_eq!(card.link_path(), "/card/b1/c1");

    let board_only = activity(base(
        "updateBoard",
        json!({ "board": { "id": "b1", "name": "Team" } }),
    ));
    assert_eq!(board_only.link_path(), "/board/b1");
}

#[test]
fn test_link_path_ignores_trello_short_forms() {
    let a = activity(base(
        "createCard",
        json!({
            "board": { "id": "b1", "name": "Team", "shortLink": "AbCd1234" },
            "card": { "id": "c1", "name": "Fix bug", "idShort": 42, "shortLink": "XyZ98765" }
        }),
    ));
    assert_eq!(a.link_path(), "/card/b1/c1");
}

#[test]
fn test_occurred_at_parsed_as_utc() {
    let a = activity(base("createCard", board_and_card()));
    assert_eq!(
        a.occurred_at(),
        DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    );
}
