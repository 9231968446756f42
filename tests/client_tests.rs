//! Integration-style client tests for the Housie Client.
//!
//! Uses the shared `MockTransport` from `tests/common` to script engine
//! pushes and verify that `HousieClient` processes them correctly, including
//! session transitions, intent generation, replay-prompt timing, and event
//! delivery through the `EventRouter`.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use housie_client::protocol::ClientIntent;
use housie_client::{
    EventKind, EventRouter, HousieClient, HousieConfig, HousieError, HousieEvent, Phase,
};

use common::{
    error_json, game_over_json, game_reset_json, new_number_json, room_data_json,
    snapshot_with_players, structured_error_json, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Helper: start a mock client with scripted pushes
// ════════════════════════════════════════════════════════════════════

/// Start a client with the given scripted engine pushes and a short replay
/// prompt delay so timing tests stay fast.
#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, HousieError>>>,
) -> (
    HousieClient,
    tokio::sync::mpsc::Receiver<HousieEvent>,
    std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    std::sync::Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let config = HousieConfig::new().with_prompt_delay(Duration::from_millis(40));
    let (client, events) = HousieClient::start(transport, config);
    (client, events, sent, closed)
}

/// Consume the synthetic `Connected` event that opens every session.
async fn drain_connected(rx: &mut tokio::sync::mpsc::Receiver<HousieEvent>) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert!(
        matches!(ev, HousieEvent::Connected),
        "first event should be Connected, got {ev:?}"
    );
}

/// Parse the last intent the client queued to the transport.
fn last_intent(sent: &std::sync::Arc<std::sync::Mutex<Vec<String>>>) -> ClientIntent {
    let messages = sent.lock().expect("sent messages lock");
    let raw = messages.last().expect("at least one sent message");
    serde_json::from_str(raw).expect("parse sent intent")
}

// ════════════════════════════════════════════════════════════════════
// Create / join round trips
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn create_room_waits_for_engine_confirmation() {
    let (mut client, mut events, sent, _closed) =
        start_client(vec![Some(Ok(room_data_json("QQ99ZZ", &[])))]);
    drain_connected(&mut events).await;

    let code = client.create_room("alice").await.expect("create room");
    assert_eq!(code.len(), 6);

    // The confirmation carries the authoritative code, which may differ from
    // the provisional one when the engine reassigns it.
    let ev = events.recv().await.expect("room-data event");
    if let HousieEvent::RoomData { snapshot } = ev {
        assert_eq!(snapshot.room_id, "QQ99ZZ");
    } else {
        panic!("expected RoomData, got {ev:?}");
    }
    assert_eq!(client.phase().await, Phase::InRoom);
    assert_eq!(client.current_room_code().await.as_deref(), Some("QQ99ZZ"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    if let ClientIntent::CreateRoom { room_id, username } = last_intent(&sent) {
        assert_eq!(room_id, code);
        assert_eq!(username, "alice");
    } else {
        panic!("expected CreateRoom intent");
    }

    client.shutdown().await;
}

#[tokio::test]
async fn join_room_full_round_trip() {
    let (mut client, mut events, sent, _closed) =
        start_client(vec![Some(Ok(room_data_json("AB12CD", &[7])))]);
    drain_connected(&mut events).await;

    client.join_room("bob", "ab12cd").await.expect("join room");

    let ev = events.recv().await.expect("room-data event");
    assert!(matches!(ev, HousieEvent::RoomData { .. }));
    assert_eq!(client.phase().await, Phase::InRoom);

    let snapshot = client.snapshot().await.expect("snapshot");
    assert!(snapshot.is_called(7));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        last_intent(&sent),
        ClientIntent::JoinRoom {
            room_id: "AB12CD".into(),
            username: "bob".into(),
        }
    );

    client.shutdown().await;
}

#[tokio::test]
async fn join_failure_leaves_the_lobby_untouched() {
    // The engine rejects the join with an error push; no room-data ever comes.
    let (mut client, mut events, _sent, _closed) =
        start_client(vec![Some(Ok(error_json("Room not found")))]);
    drain_connected(&mut events).await;

    client.join_room("bob", "NOPE00").await.expect("queue join");

    let ev = events.recv().await.expect("error event");
    if let HousieEvent::ServerError { message } = ev {
        assert_eq!(message, "Room not found");
    } else {
        panic!("expected ServerError, got {ev:?}");
    }

    // Still in the lobby, no confirmed room.
    assert_eq!(client.phase().await, Phase::Lobby);
    assert!(client.current_room_code().await.is_none());
    assert!(matches!(
        client.call_next_number().await,
        Err(HousieError::NotInRoom)
    ));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Number draws
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn draws_update_last_number_and_snapshot_together() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Ok(new_number_json("AB12CD", 7, &[7]))),
        Some(Ok(new_number_json("AB12CD", 42, &[7, 42]))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData

    let ev = events.recv().await.expect("first draw");
    if let HousieEvent::NumberCalled { number, snapshot } = ev {
        assert_eq!(number, 7);
        assert_eq!(snapshot.numbers_called, vec![7]);
    } else {
        panic!("expected NumberCalled, got {ev:?}");
    }

    let ev = events.recv().await.expect("second draw");
    assert!(matches!(ev, HousieEvent::NumberCalled { number: 42, .. }));

    assert_eq!(client.last_number().await, Some(42));
    let snapshot = client.snapshot().await.expect("snapshot");
    assert!(snapshot.is_called(7));
    assert!(snapshot.is_called(42));
    assert!(!snapshot.is_called(13));

    client.shutdown().await;
}

#[tokio::test]
async fn draws_before_room_confirmation_are_ignored() {
    // A stray draw for a room we never confirmed must not fabricate state.
    let (mut client, mut events, _sent, _closed) =
        start_client(vec![Some(Ok(new_number_json("ZZ00ZZ", 3, &[3])))]);
    drain_connected(&mut events).await;

    let _ = events.recv().await; // the event is still surfaced to the consumer
    assert_eq!(client.phase().await, Phase::Lobby);
    assert!(client.last_number().await.is_none());
    assert!(client.snapshot().await.is_none());

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Game over and the replay prompt
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn win_then_accept_replay_round_trip() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Ok(game_over_json("AB12CD", 88, "carol"))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData

    let ev = events.recv().await.expect("game-over event");
    if let HousieEvent::GameOver { number, winner, .. } = ev {
        assert_eq!(number, 88);
        assert_eq!(winner, "carol");
    } else {
        panic!("expected GameOver, got {ev:?}");
    }

    // The prompt has not armed yet; accept is rejected until it does.
    assert!(matches!(
        client.accept_replay().await,
        Err(HousieError::NoPromptActive)
    ));

    let ev = events.recv().await.expect("replay prompt");
    assert!(matches!(ev, HousieEvent::ReplayPrompt));
    assert!(client.is_prompt_armed().await);

    client.accept_replay().await.expect("accept replay");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(last_intent(&sent), ClientIntent::ResetGame("AB12CD".into()));

    client.shutdown().await;
}

#[tokio::test]
async fn engine_reset_restores_the_room_for_a_fresh_game() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[1, 2, 3]))),
        Some(Ok(game_over_json("AB12CD", 90, "alice"))),
        Some(Ok(game_reset_json("AB12CD"))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData
    let _ = events.recv().await; // GameOver

    let ev = events.recv().await.expect("game-reset event");
    if let HousieEvent::GameReset { snapshot } = ev {
        assert!(snapshot.numbers_called.is_empty());
    } else {
        panic!("expected GameReset, got {ev:?}");
    }

    // Membership survives the reset; the finished-game residue does not.
    assert_eq!(client.phase().await, Phase::InRoom);
    assert_eq!(client.current_room_code().await.as_deref(), Some("AB12CD"));
    assert!(client.winner().await.is_none());
    assert!(client.last_number().await.is_none());
    assert!(!client.is_prompt_armed().await);

    // The cancelled timer must stay silent.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(events.try_recv().is_err());

    client.shutdown().await;
}

#[tokio::test]
async fn decline_replay_discards_the_room() {
    let (mut client, mut events, sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Ok(game_over_json("AB12CD", 15, "bob"))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData
    let _ = events.recv().await; // GameOver
    let _ = events.recv().await; // ReplayPrompt

    let before = sent.lock().expect("sent lock").len();
    client.decline_replay().await.expect("decline");
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Declining is local only.
    assert_eq!(sent.lock().expect("sent lock").len(), before);
    assert_eq!(client.phase().await, Phase::Lobby);
    assert!(client.snapshot().await.is_none());
    assert!(client.winner().await.is_none());

    // A second decline finds no prompt.
    assert!(matches!(
        client.decline_replay().await,
        Err(HousieError::NoPromptActive)
    ));

    client.shutdown().await;
}

#[tokio::test]
async fn create_is_rejected_while_in_a_room_but_works_after_decline() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Ok(game_over_json("AB12CD", 15, "bob"))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData

    // Already in a room: a second create/join is a local validation error.
    assert!(matches!(
        client.create_room("alice").await,
        Err(HousieError::Validation(_))
    ));
    assert!(matches!(
        client.join_room("alice", "XY34ZW").await,
        Err(HousieError::Validation(_))
    ));

    let _ = events.recv().await; // GameOver
    let _ = events.recv().await; // ReplayPrompt
    client.decline_replay().await.expect("decline");

    // Back in the lobby, a fresh create is allowed again.
    let code = client.create_room("alice").await.expect("fresh create");
    assert_eq!(code.len(), 6);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Engine errors
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn both_error_payload_shapes_surface_the_same_way() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(error_json("bare message"))),
        Some(Ok(structured_error_json("structured message"))),
    ]);
    drain_connected(&mut events).await;

    let ev = events.recv().await.expect("first error");
    assert!(matches!(
        ev,
        HousieEvent::ServerError { ref message } if message == "bare message"
    ));
    let ev = events.recv().await.expect("second error");
    assert!(matches!(
        ev,
        HousieEvent::ServerError { ref message } if message == "structured message"
    ));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// EventRouter integration
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn router_pump_fans_events_out_by_kind() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Ok(new_number_json("AB12CD", 7, &[7]))),
        Some(Ok(new_number_json("AB12CD", 8, &[7, 8]))),
        None, // engine closes, which ends the pump
    ]);

    let router = EventRouter::new();
    let numbers = Arc::new(Mutex::new(Vec::new()));
    let rooms = Arc::new(AtomicUsize::new(0));

    let numbers_sink = Arc::clone(&numbers);
    let _draws = router.bind(
        EventKind::NewNumber,
        Box::new(move |event| {
            if let HousieEvent::NumberCalled { number, .. } = event {
                numbers_sink.lock().expect("numbers lock").push(*number);
            }
        }),
    );
    let rooms_sink = Arc::clone(&rooms);
    let _room = router.bind(
        EventKind::RoomData,
        Box::new(move |_| {
            rooms_sink.fetch_add(1, Ordering::Relaxed);
        }),
    );

    router.pump(&mut events).await;

    assert_eq!(*numbers.lock().expect("numbers lock"), vec![7, 8]);
    assert_eq!(rooms.load(Ordering::Relaxed), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn rebinding_a_kind_replaces_the_previous_handler() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(new_number_json("AB12CD", 7, &[7]))),
        None,
    ]);

    let router = EventRouter::new();
    let first_hits = Arc::new(AtomicUsize::new(0));
    let second_hits = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&first_hits);
    let mut first = router.bind(
        EventKind::NewNumber,
        Box::new(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        }),
    );
    let sink = Arc::clone(&second_hits);
    let _second = router.bind(
        EventKind::NewNumber,
        Box::new(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        }),
    );

    // Disposing the superseded registration must not disturb the live one.
    first.dispose();

    router.pump(&mut events).await;

    assert_eq!(first_hits.load(Ordering::Relaxed), 0);
    assert_eq!(second_hits.load(Ordering::Relaxed), 1);

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Multi-player snapshots
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshot_projection_over_multiple_players() {
    let snapshot = snapshot_with_players("AB12CD", &["alice", "bob"], &[3, 9]);
    let push = serde_json::to_string(&housie_client::ServerEvent::RoomData(snapshot))
        .expect("serialize push");

    let (mut client, mut events, _sent, _closed) = start_client(vec![Some(Ok(push))]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData

    let snapshot = client.snapshot().await.expect("snapshot");
    assert_eq!(snapshot.players.len(), 2);
    assert!(snapshot.player("bob").is_some());
    assert!(snapshot.player("mallory").is_none());
    assert!(snapshot.is_marked_by("alice", 3));
    assert!(!snapshot.is_marked_by("alice", 5));

    client.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Transport failure
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn receive_error_disconnects_with_a_reason() {
    let (mut client, mut events, _sent, _closed) = start_client(vec![
        Some(Ok(room_data_json("AB12CD", &[]))),
        Some(Err(HousieError::TransportReceive("connection reset".into()))),
    ]);
    drain_connected(&mut events).await;
    let _ = events.recv().await; // RoomData

    let ev = events.recv().await.expect("disconnected event");
    if let HousieEvent::Disconnected { reason } = ev {
        let reason = reason.expect("reason");
        assert!(reason.contains("connection reset"));
    } else {
        panic!("expected Disconnected, got {ev:?}");
    }
    assert!(!client.is_connected());

    // The channel ends after the terminal event.
    assert!(events.recv().await.is_none());

    client.shutdown().await;
}
