#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol serialization tests for the Housie Client.
//!
//! Verifies the wire encoding of every `ClientIntent` and `ServerEvent`
//! variant against JSON fixtures that match real engine traffic, plus the
//! snapshot projection helpers and room-code normalization.

use housie_client::protocol::{
    normalize_room_code, ClientIntent, ErrorPayload, Player, RoomSnapshot, ServerEvent,
    MAX_NUMBER, ROOM_CODE_LEN, TICKET_SIZE,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn sample_player(name: &str, marks: &[u8]) -> Player {
    Player {
        username: name.into(),
        ticket: (1..=15).collect(),
        marks: marks.to_vec(),
    }
}

fn sample_snapshot() -> RoomSnapshot {
    RoomSnapshot {
        room_id: "AB12CD".into(),
        players: vec![sample_player("alice", &[7])],
        numbers_called: vec![7],
    }
}

// ════════════════════════════════════════════════════════════════════
// ClientIntent wire format
// ════════════════════════════════════════════════════════════════════

#[test]
fn create_room_intent_wire_format() {
    let intent = ClientIntent::CreateRoom {
        room_id: "AB12CD".into(),
        username: "alice".into(),
    };
    let json = serde_json::to_string(&intent).expect("serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
    assert_eq!(value["event"], "create-room");
    assert_eq!(value["data"]["roomID"], "AB12CD");
    assert_eq!(value["data"]["username"], "alice");
}

#[test]
fn join_room_intent_wire_format() {
    let intent = ClientIntent::JoinRoom {
        room_id: "AB12CD".into(),
        username: "bob".into(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&intent).expect("serialize")).expect("parse");
    assert_eq!(value["event"], "join-room");
    assert_eq!(value["data"]["roomID"], "AB12CD");
}

#[test]
fn generate_number_intent_carries_a_bare_room_code() {
    let intent = ClientIntent::GenerateNumber("AB12CD".into());
    let json = serde_json::to_string(&intent).expect("serialize");
    assert_eq!(json, r#"{"event":"generate-number","data":"AB12CD"}"#);
}

#[test]
fn reset_game_intent_carries_a_bare_room_code() {
    let intent = ClientIntent::ResetGame("AB12CD".into());
    let json = serde_json::to_string(&intent).expect("serialize");
    assert_eq!(json, r#"{"event":"reset-game","data":"AB12CD"}"#);
}

// ════════════════════════════════════════════════════════════════════
// ServerEvent fixtures (shaped like real engine pushes)
// ════════════════════════════════════════════════════════════════════

#[test]
fn room_data_fixture() {
    let raw = r#"{
        "event": "room-data",
        "data": {
            "roomID": "AB12CD",
            "players": [
                {"username": "alice", "ticket": [4, 9, 17, 22, 31, 38, 45, 51, 56, 63, 67, 74, 79, 83, 90], "marks": []}
            ],
            "numbersCalled": []
        }
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::RoomData(snapshot) = event {
        assert_eq!(snapshot.room_id, "AB12CD");
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].ticket.len(), TICKET_SIZE);
        assert!(snapshot.numbers_called.is_empty());
    } else {
        panic!("expected RoomData, got {event:?}");
    }
}

#[test]
fn room_data_fixture_without_marks_field() {
    // Older engine builds omit per-player marks; the field defaults to empty.
    let raw = r#"{
        "event": "room-data",
        "data": {
            "roomID": "AB12CD",
            "players": [{"username": "alice", "ticket": [1, 2, 3]}],
            "numbersCalled": [2]
        }
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::RoomData(snapshot) = event {
        assert!(snapshot.players[0].marks.is_empty());
    } else {
        panic!("expected RoomData, got {event:?}");
    }
}

#[test]
fn new_number_fixture() {
    let raw = r#"{
        "event": "new-number",
        "data": {
            "number": 42,
            "roomData": {
                "roomID": "AB12CD",
                "players": [{"username": "alice", "ticket": [42], "marks": [42]}],
                "numbersCalled": [42]
            }
        }
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::NewNumber { number, room_data } = event {
        assert_eq!(number, 42);
        assert!(number <= MAX_NUMBER);
        assert!(room_data.is_called(42));
        assert!(room_data.is_marked_by("alice", 42));
    } else {
        panic!("expected NewNumber, got {event:?}");
    }
}

#[test]
fn game_over_fixture() {
    let raw = r#"{
        "event": "game-over",
        "data": {
            "number": 88,
            "roomData": {"roomID": "AB12CD", "players": [], "numbersCalled": [88]},
            "username": "carol"
        }
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::GameOver {
        number, username, ..
    } = event
    {
        assert_eq!(number, 88);
        assert_eq!(username, "carol");
    } else {
        panic!("expected GameOver, got {event:?}");
    }
}

#[test]
fn game_reset_fixture() {
    let raw = r#"{
        "event": "game-reset",
        "data": {"roomID": "AB12CD", "players": [], "numbersCalled": []}
    }"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    assert!(matches!(event, ServerEvent::GameReset(_)));
}

#[test]
fn error_fixture_bare_string() {
    let raw = r#"{"event": "error", "data": "Room not found"}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::Error(payload) = event {
        assert_eq!(payload.message(), "Room not found");
    } else {
        panic!("expected Error, got {event:?}");
    }
}

#[test]
fn error_fixture_structured_object() {
    let raw = r#"{"event": "error", "data": {"message": "Room is full"}}"#;
    let event: ServerEvent = serde_json::from_str(raw).expect("deserialize");
    if let ServerEvent::Error(payload) = event {
        assert_eq!(payload.message(), "Room is full");
    } else {
        panic!("expected Error, got {event:?}");
    }
}

#[test]
fn server_event_round_trips() {
    let events = vec![
        ServerEvent::RoomData(sample_snapshot()),
        ServerEvent::NewNumber {
            number: 7,
            room_data: sample_snapshot(),
        },
        ServerEvent::GameOver {
            number: 7,
            room_data: sample_snapshot(),
            username: "alice".into(),
        },
        ServerEvent::GameReset(sample_snapshot()),
        ServerEvent::Error(ErrorPayload::Bare("nope".into())),
    ];
    for event in events {
        let json = serde_json::to_string(&event).expect("serialize");
        let back: ServerEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}

#[test]
fn unknown_event_tag_is_rejected() {
    let raw = r#"{"event": "telemetry-ping", "data": {}}"#;
    assert!(serde_json::from_str::<ServerEvent>(raw).is_err());
}

// ════════════════════════════════════════════════════════════════════
// Snapshot projections
// ════════════════════════════════════════════════════════════════════

#[test]
fn snapshot_projection_helpers() {
    let snapshot = RoomSnapshot {
        room_id: "AB12CD".into(),
        players: vec![sample_player("alice", &[7]), sample_player("bob", &[])],
        numbers_called: vec![7, 13],
    };
    assert!(snapshot.is_called(7));
    assert!(snapshot.is_called(13));
    assert!(!snapshot.is_called(90));
    assert_eq!(
        snapshot.player("bob").map(|p| p.username.as_str()),
        Some("bob")
    );
    assert!(snapshot.player("mallory").is_none());
    assert!(snapshot.is_marked_by("alice", 7));
    assert!(!snapshot.is_marked_by("bob", 7));
    assert!(!snapshot.is_marked_by("mallory", 7));
}

#[test]
fn player_has_marked() {
    let player = sample_player("alice", &[3, 7]);
    assert!(player.has_marked(3));
    assert!(!player.has_marked(4));
}

// ════════════════════════════════════════════════════════════════════
// Room code normalization
// ════════════════════════════════════════════════════════════════════

#[test]
fn normalize_trims_and_uppercases() {
    assert_eq!(normalize_room_code("  ab12cd "), "AB12CD");
    assert_eq!(normalize_room_code("AB12CD"), "AB12CD");
    assert_eq!(normalize_room_code(""), "");
    assert_eq!(normalize_room_code("   "), "");
}

#[test]
fn room_code_length_constant() {
    assert_eq!(ROOM_CODE_LEN, 6);
}
