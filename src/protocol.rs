//! Wire-compatible protocol types for the housie room engine.
//!
//! Every type in this module produces identical JSON to the engine's channel
//! payloads. Messages are adjacently tagged: the channel event name goes in
//! `"event"`, the payload in `"data"`, e.g.
//!
//! ```json
//! {"event":"new-number","data":{"number":42,"roomData":{...}}}
//! ```
//!
//! Field names follow the engine's camelCase convention (`roomID`,
//! `numbersCalled`), mapped here with explicit `#[serde(rename)]`.

use serde::{Deserialize, Serialize};

// ── Constants ───────────────────────────────────────────────────────

/// Numbers are drawn from `1..=MAX_NUMBER`.
pub const MAX_NUMBER: u8 = 90;

/// Every ticket holds exactly this many distinct numbers.
pub const TICKET_SIZE: usize = 15;

/// Length of a room code (uppercase alphanumeric).
pub const ROOM_CODE_LEN: usize = 6;

/// Normalize a room code the way the engine stores it: trimmed, uppercase.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

// ── Structs ─────────────────────────────────────────────────────────

/// One player in a room: their name, dealt ticket, and marked numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Display name, unique within the room.
    pub username: String,
    /// Fixed sequence of [`TICKET_SIZE`] distinct numbers in `1..=MAX_NUMBER`.
    pub ticket: Vec<u8>,
    /// Subset of `ticket` matched against the called numbers so far.
    #[serde(default)]
    pub marks: Vec<u8>,
}

impl Player {
    /// Whether this player has `number` marked on their ticket.
    pub fn has_marked(&self, number: u8) -> bool {
        self.marks.contains(&number)
    }
}

/// The complete, authoritative room state pushed by the engine.
///
/// The client holds an immutable-until-replaced copy: every inbound push
/// replaces the whole snapshot, partial deltas are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// Short uppercase room code identifying this room.
    #[serde(rename = "roomID")]
    pub room_id: String,
    /// Join-ordered player roster.
    pub players: Vec<Player>,
    /// Draw history for the current game, in call order, no duplicates.
    #[serde(rename = "numbersCalled")]
    pub numbers_called: Vec<u8>,
}

impl RoomSnapshot {
    /// Look up a player by username.
    pub fn player(&self, username: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.username == username)
    }

    /// Whether `number` has been called in the current game.
    pub fn is_called(&self, number: u8) -> bool {
        self.numbers_called.contains(&number)
    }

    /// Whether `number` is marked on the ticket of the named player.
    ///
    /// Pure projection over the snapshot — computed on every read so it can
    /// never drift from the authoritative state.
    pub fn is_marked_by(&self, username: &str, number: u8) -> bool {
        self.player(username).is_some_and(|p| p.has_marked(number))
    }
}

/// Payload of an `error` event.
///
/// Some engine deployments emit `{ "message": "..." }`, older ones a bare
/// string. Both deserialize into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// Structured form: `{ "message": "..." }`.
    Structured {
        /// Human-readable error message.
        message: String,
    },
    /// Bare string form.
    Bare(String),
}

impl ErrorPayload {
    /// The error message regardless of wire form.
    pub fn message(&self) -> &str {
        match self {
            Self::Structured { message } => message,
            Self::Bare(message) => message,
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Intents sent from client to the room engine.
///
/// An intent never mutates client state by itself; the engine confirms every
/// successful intent with a subsequent push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientIntent {
    /// Create a new room and join it as the first player.
    #[serde(rename = "create-room")]
    CreateRoom {
        #[serde(rename = "roomID")]
        room_id: String,
        username: String,
    },
    /// Join an existing room by code.
    #[serde(rename = "join-room")]
    JoinRoom {
        #[serde(rename = "roomID")]
        room_id: String,
        username: String,
    },
    /// Request the next draw. Payload is the bare room code.
    #[serde(rename = "generate-number")]
    GenerateNumber(String),
    /// Request a fresh game in the same room. Payload is the bare room code.
    #[serde(rename = "reset-game")]
    ResetGame(String),
}

/// Events pushed from the room engine to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full room state: confirms create/join and any roster change.
    #[serde(rename = "room-data")]
    RoomData(RoomSnapshot),
    /// A number was drawn. Carries the updated snapshot in the same message.
    #[serde(rename = "new-number")]
    NewNumber {
        number: u8,
        #[serde(rename = "roomData")]
        room_data: RoomSnapshot,
    },
    /// The winning draw: number, final snapshot, and winner username arrive
    /// in one message and must be applied atomically.
    #[serde(rename = "game-over")]
    GameOver {
        number: u8,
        #[serde(rename = "roomData")]
        room_data: RoomSnapshot,
        username: String,
    },
    /// A fresh game started in the same room: new tickets, empty draw history.
    #[serde(rename = "game-reset")]
    GameReset(RoomSnapshot),
    /// Engine-reported error, surfaced verbatim to the user.
    #[serde(rename = "error")]
    Error(ErrorPayload),
}
