// Verify the envelope format matches what web and mobile clients expect.
// These tests ensure push compatibility is never broken.

use simplenotes_core::Permission;
use simplenotes_protocol::{
    ConnectionKill, EventType, InboundMessage, KillCode, NoteDeleted, NoteSnapshot, SocketEvent,
    UserSnapshot,
};

fn note() -> NoteSnapshot {
    NoteSnapshot {
        id: 42,
        name: "groceries".into(),
        content: Some("# list".into()),
        tags: vec!["home".into()],
        visibility: "PRIVATE".into(),
        note_type: "MARKDOWN".into(),
        content_size: 6,
        created_by_id: 7,
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-01T00:00:00Z".into(),
    }
}

fn user() -> UserSnapshot {
    UserSnapshot {
        id: 7,
        username: "ana".into(),
        permissions: Permission::CREATE_NOTES | Permission::EDIT_NOTES,
        is_verified: Some(true),
        suspended: None,
        created_at: "2026-01-01T00:00:00Z".into(),
        updated_at: "2026-01-02T00:00:00Z".into(),
    }
}

#[test]
fn payloadless_events_omit_data() {
    for (event, expected) in [
        (SocketEvent::Ack, r#"{"type":"ACK"}"#),
        (SocketEvent::Ping, r#"{"type":"PING"}"#),
        (SocketEvent::SessionExpired, r#"{"type":"SESSION_EXPIRED"}"#),
    ] {
        let json = event.to_envelope().unwrap();
        assert_eq!(json, expected);
        // data must be absent, never null
        assert!(!json.contains("null"));
    }
}

#[test]
fn connection_kill_is_bit_exact() {
    let json = SocketEvent::kill(KillCode::Logout).to_envelope().unwrap();
    assert_eq!(json, r#"{"type":"CONNECTION_KILL","data":{"code":"LOGOUT"}}"#);

    let json = SocketEvent::ConnectionKill(
        ConnectionKill::new(KillCode::SuspendedAccount).with_reason("abuse"),
    )
    .to_envelope()
    .unwrap();
    assert_eq!(
        json,
        r#"{"type":"CONNECTION_KILL","data":{"code":"SUSPENDED_ACCOUNT","reason":"abuse"}}"#
    );
}

#[test]
fn note_deleted_carries_only_the_id() {
    let json = SocketEvent::NoteDeleted(NoteDeleted { id: 42 })
        .to_envelope()
        .unwrap();
    assert_eq!(json, r#"{"type":"NOTE_DELETED","data":{"id":42}}"#);
}

#[test]
fn note_snapshot_is_not_nested_in_a_second_envelope() {
    let json = SocketEvent::NoteCreated(note()).to_envelope().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["type"], "NOTE_CREATED");
    assert_eq!(value["data"]["id"], 42);
    assert_eq!(value["data"]["note_type"], "MARKDOWN");
    assert!(value["data"].get("type").is_none());
}

#[test]
fn user_snapshot_permissions_are_an_integer() {
    let json = SocketEvent::UserUpdated(user()).to_envelope().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["data"]["permissions"], 6);
    // unset optionals are dropped
    assert!(value["data"].get("suspended").is_none());
}

#[test]
fn every_variant_round_trips_with_its_tag() {
    let events = vec![
        SocketEvent::Ping,
        SocketEvent::Ack,
        SocketEvent::kill(KillCode::IdleTimeout),
        SocketEvent::SessionExpired,
        SocketEvent::NoteCreated(note()),
        SocketEvent::NoteUpdated(note()),
        SocketEvent::NoteDeleted(NoteDeleted { id: 9 }),
        SocketEvent::UserUpdated(user()),
    ];

    for event in events {
        let json = event.to_envelope().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], event.event_type().as_str());

        let parsed = SocketEvent::from_envelope(&json).unwrap();
        assert_eq!(parsed, event);
    }
}

#[test]
fn client_ping_parses_as_inbound() {
    let msg = InboundMessage::parse(r#"{"type":"PING"}"#).unwrap();
    assert_eq!(msg.kind(), Some(EventType::Ping));
    assert_eq!(serde_json::to_string(&InboundMessage::new(EventType::Ping)).unwrap(), r#"{"type":"PING"}"#);
}
