#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;

use super::*;

fn record_json(value: &serde_json::Value) -> HistoryRecord {
    serde_json::from_value(value.clone()).expect("record")
}

// --- Action ---

#[test]
fn action_parses_case_insensitively() {
    assert_eq!("insert".parse::<Action>(), Ok(Action::Insert));
    assert_eq!("UPDATE".parse::<Action>(), Ok(Action::Update));
    assert_eq!(" Delete ".parse::<Action>(), Ok(Action::Delete));
}

#[test]
fn action_rejects_unknown_literal() {
    assert!("TRUNCATE".parse::<Action>().is_err());
    assert!("UNKNOWN".parse::<Action>().is_err());
}

#[test]
fn unrecognised_action_keeps_raw_text() {
    let r = record_json(&json!({ "action": "TRUNCATE", "tableName": "moves" }));
    assert_eq!(r.action, Action::Unknown("TRUNCATE".to_string()));
    assert_eq!(r.action.to_string(), "TRUNCATE");
    assert_eq!(r.key().to_string(), "TRUNCATE <none> moves");
}

#[test]
fn known_actions_deserialize_in_any_case() {
    let r = record_json(&json!({ "action": "update", "tableName": "moves" }));
    assert_eq!(r.action, Action::Update);
    assert_eq!(serde_json::to_value(&r.action).unwrap(), json!("UPDATE"));
}

// --- HistoryRecord deserialization ---

#[test]
fn full_record_deserializes() {
    let r = record_json(&json!({
        "id": "a1",
        "action": "UPDATE",
        "eventName": "updateOrder",
        "tableName": "orders",
        "changedValues": { "sac": "23456", "has_dependents": true },
        "oldValues": { "sac": null },
        "context": [{ "shipment_type": "HHG" }],
        "actionTstampTx": "2022-03-08T19:36:09.000Z",
        "sessionUserFirstName": "Leo",
        "sessionUserLastName": "Spaceman"
    }));
    assert_eq!(r.action, Action::Update);
    assert_eq!(r.event_name.as_deref(), Some("updateOrder"));
    assert_eq!(r.table_name, "orders");
    assert_eq!(r.changed_text("sac").as_deref(), Some("23456"));
    assert_eq!(r.changed_text("has_dependents").as_deref(), Some("true"));
    assert_eq!(r.old_text("sac"), None);
    assert_eq!(r.context_text(0, "shipment_type").as_deref(), Some("HHG"));
    assert_eq!(r.user_name().as_deref(), Some("Leo Spaceman"));
}

#[test]
fn null_collections_become_empty() {
    let r = record_json(&json!({
        "action": "INSERT",
        "eventName": null,
        "tableName": "moves",
        "changedValues": null,
        "oldValues": null,
        "context": null
    }));
    assert!(r.changed_values.is_empty());
    assert!(r.old_values.is_empty());
    assert!(r.context.is_empty());
    assert_eq!(r.event_name, None);
}

#[test]
fn null_table_name_becomes_empty() {
    let r = record_json(&json!({ "action": "DELETE", "tableName": null }));
    assert_eq!(r.table_name, "");
}

#[test]
fn user_name_skips_missing_parts() {
    let mut r = HistoryRecord::new(Action::Insert, None, "moves");
    assert_eq!(r.user_name(), None);
    r.session_user_last_name = Some("Spaceman".to_string());
    assert_eq!(r.user_name().as_deref(), Some("Spaceman"));
    r.session_user_first_name = Some("  ".to_string());
    assert_eq!(r.user_name().as_deref(), Some("Spaceman"));
}

#[test]
fn key_borrows_record_fields() {
    let r = HistoryRecord::new(Action::Delete, Some("deleteShipment"), "mto_shipments");
    let key = r.key();
    assert_eq!(key.action, &Action::Delete);
    assert_eq!(key.event_name, Some("deleteShipment"));
    assert_eq!(key.table_name, "mto_shipments");
    assert_eq!(key.to_string(), "DELETE deleteShipment mto_shipments");
}

// --- value_text ---

#[test]
fn value_text_variants() {
    assert_eq!(value_text(&json!(null)), "");
    assert_eq!(value_text(&json!("x")), "x");
    assert_eq!(value_text(&json!(42)), "42");
    assert_eq!(value_text(&json!(false)), "false");
    assert_eq!(value_text(&json!(["a", 1])), "a, 1");
    assert_eq!(value_text(&json!({"k": 1})), r#"{"k":1}"#);
}

// --- parse_records ---

#[test]
fn parse_bare_array() {
    let records = parse_records(r#"[{"action":"INSERT","tableName":"moves"}]"#).unwrap();
    assert_eq!(records.len(), 1);
}

#[test]
fn parse_move_history_envelope() {
    let json = r#"{
        "id": "m1",
        "locator": "ABC123",
        "referenceId": "1234-5678",
        "historyRecords": [
            {"action":"INSERT","tableName":"moves"},
            {"action":"UPDATE","eventName":"updateMove","tableName":"moves"}
        ]
    }"#;
    let records = parse_records(json).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].event_name.as_deref(), Some("updateMove"));
}

#[test]
fn parse_rejects_other_shapes() {
    let err = parse_records(r#""just a string""#).unwrap_err();
    assert!(format!("{err:#}").contains("expected a JSON array"));
}

#[test]
fn parse_single_record_object() {
    let records =
        parse_records(r#"{"action":"INSERT","eventName":"createMove","tableName":"moves"}"#)
            .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_name.as_deref(), Some("createMove"));
}

#[test]
fn parse_rejects_misspelled_envelope() {
    let err = parse_records(r#"{"records":[{"action":"INSERT","tableName":"moves"}]}"#)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("historyRecords"), "got: {msg}");
    assert!(msg.contains("found keys: records"), "got: {msg}");
}

#[test]
fn parse_null_history_records_is_empty() {
    assert!(parse_records(r#"{"locator":"ABC123","historyRecords":null}"#)
        .unwrap()
        .is_empty());
}

#[test]
fn parse_names_the_bad_record() {
    let err = parse_records(
        r#"[{"action":"INSERT","tableName":"moves"},{"eventName":"x","tableName":"moves"}]"#,
    )
    .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("invalid history record #2"), "got: {msg}");
    assert!(msg.contains("action"), "got: {msg}");
}

#[test]
fn parse_accepts_null_table_name() {
    let records = parse_records(r#"[{"action":"INSERT","tableName":null}]"#).unwrap();
    assert_eq!(records[0].table_name, "");
}
