#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Housie Client integration tests.
//!
//! Provides a channel-based [`MockTransport`] and helper functions for
//! constructing common engine push JSON strings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use housie_client::protocol::{ErrorPayload, Player, RoomSnapshot, ServerEvent};
use housie_client::{HousieError, Transport};

// ── MockTransport ───────────────────────────────────────────────────

/// A channel-based mock transport for integration testing.
///
/// Scripted engine pushes are consumed in order by `recv()`.
/// All messages sent by the client are recorded in `sent`.
pub struct MockTransport {
    /// Scripted engine pushes (consumed in order by `recv`).
    incoming: VecDeque<Option<Result<String, HousieError>>>,
    /// Recorded outgoing messages from the client.
    pub sent: Arc<StdMutex<Vec<String>>>,
    /// Whether `close()` has been called.
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new mock transport with the given scripted incoming messages.
    ///
    /// Returns the transport plus shared handles for inspecting sent messages
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, HousieError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), HousieError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, HousieError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // No more scripted messages — hang forever so the transport loop
            // stays alive until shutdown is called.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), HousieError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Snapshot builders ───────────────────────────────────────────────

/// A one-player room snapshot with the given called numbers.
pub fn snapshot(room: &str, numbers: &[u8]) -> RoomSnapshot {
    snapshot_with_players(room, &["alice"], numbers)
}

/// A room snapshot with the given usernames and called numbers.
///
/// Every player gets the same 15-number ticket (1..=15) and marks that
/// overlap the called numbers, which is enough for projection tests.
pub fn snapshot_with_players(room: &str, usernames: &[&str], numbers: &[u8]) -> RoomSnapshot {
    let players = usernames
        .iter()
        .map(|name| Player {
            username: (*name).into(),
            ticket: (1..=15).collect(),
            marks: numbers.iter().copied().filter(|n| *n <= 15).collect(),
        })
        .collect();
    RoomSnapshot {
        room_id: room.into(),
        players,
        numbers_called: numbers.to_vec(),
    }
}

// ── JSON helper functions ───────────────────────────────────────────

/// Returns the JSON string for a `room-data` push.
pub fn room_data_json(room: &str, numbers: &[u8]) -> String {
    serde_json::to_string(&ServerEvent::RoomData(snapshot(room, numbers)))
        .expect("room_data_json serialization")
}

/// Returns the JSON string for a `new-number` push.
pub fn new_number_json(room: &str, number: u8, numbers: &[u8]) -> String {
    serde_json::to_string(&ServerEvent::NewNumber {
        number,
        room_data: snapshot(room, numbers),
    })
    .expect("new_number_json serialization")
}

/// Returns the JSON string for a `game-over` push.
pub fn game_over_json(room: &str, number: u8, winner: &str) -> String {
    serde_json::to_string(&ServerEvent::GameOver {
        number,
        room_data: snapshot(room, &[number]),
        username: winner.into(),
    })
    .expect("game_over_json serialization")
}

/// Returns the JSON string for a `game-reset` push.
pub fn game_reset_json(room: &str) -> String {
    serde_json::to_string(&ServerEvent::GameReset(snapshot(room, &[])))
        .expect("game_reset_json serialization")
}

/// Returns the JSON string for an `error` push with a bare string payload.
pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ServerEvent::Error(ErrorPayload::Bare(message.into())))
        .expect("error_json serialization")
}

/// Returns the JSON string for an `error` push with a structured payload.
pub fn structured_error_json(message: &str) -> String {
    serde_json::to_string(&ServerEvent::Error(ErrorPayload::Structured {
        message: message.into(),
    }))
    .expect("structured_error_json serialization")
}
