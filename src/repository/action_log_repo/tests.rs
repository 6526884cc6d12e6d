use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_test_log(action_type: ActionType, item_id: &str, hour: u32) -> ActionLog {
    let ts = NaiveDate::from_ymd_opt(2026, 3, 2)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap();
    ActionLog::new(action_type, "user1", ts)
        .with_schedule("S1")
        .with_item(item_id)
        .with_payload(serde_json::json!({ "quantity": 5.0 }))
        .with_detail("Test log")
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = make_test_log(ActionType::StartItem, "I1", 9);
    let action_id = repo.insert(&log).unwrap();

    let found = repo.find_by_id(&action_id).unwrap().unwrap();
    assert_eq!(found.action_type, "StartItem");
    assert_eq!(found.item_id.as_deref(), Some("I1"));
    assert_eq!(found.payload_json, Some(serde_json::json!({ "quantity": 5.0 })));
}

#[test]
fn test_find_by_item_newest_first() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&make_test_log(ActionType::StartItem, "I1", 9)).unwrap();
    repo.insert(&make_test_log(ActionType::RecordCompletion, "I1", 10)).unwrap();
    repo.insert(&make_test_log(ActionType::RecordCompletion, "I2", 11)).unwrap();

    let logs = repo.find_by_item("I1").unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_type, "RecordCompletion");
    assert_eq!(logs[1].action_type, "StartItem");

    assert_eq!(repo.find_by_schedule("S1").unwrap().len(), 3);
    assert_eq!(repo.find_recent_by_type("RecordCompletion", 1).unwrap().len(), 1);
}
