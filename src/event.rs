//! Consumer-facing events emitted by the client.
//!
//! [`HousieEvent`] is what the presentation layer receives on the channel
//! returned by [`HousieClient::start`](crate::client::HousieClient::start).
//! Most variants mirror an engine push one-to-one; `Connected`,
//! `ReplayPrompt`, and `Disconnected` are synthesized by the client itself.

use crate::protocol::{RoomSnapshot, ServerEvent};

/// The named engine event kinds a view can subscribe to.
///
/// Used by the [`EventRouter`](crate::router::EventRouter) as a registry key:
/// each kind has at most one bound handler at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `room-data` push.
    RoomData,
    /// `new-number` push.
    NewNumber,
    /// `game-over` push.
    GameOver,
    /// `game-reset` push.
    GameReset,
    /// `error` push.
    Error,
}

/// Events delivered to the client's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HousieEvent {
    /// Synthetic: the transport loop started and the channel is live.
    Connected,
    /// Full room state replaced (create/join confirmation, roster change).
    RoomData {
        snapshot: RoomSnapshot,
    },
    /// A number was drawn.
    NumberCalled {
        number: u8,
        snapshot: RoomSnapshot,
    },
    /// The game ended with a winner.
    GameOver {
        number: u8,
        snapshot: RoomSnapshot,
        winner: String,
    },
    /// A fresh game started in the same room.
    GameReset {
        snapshot: RoomSnapshot,
    },
    /// Engine-reported error, verbatim.
    ServerError {
        message: String,
    },
    /// Synthetic: the post-win delay elapsed and the replay prompt is now
    /// showing.
    ReplayPrompt,
    /// Synthetic: the transport closed. Always the last event on the channel.
    Disconnected {
        reason: Option<String>,
    },
}

impl HousieEvent {
    /// The engine event kind this event corresponds to, if any.
    ///
    /// Synthetic events (`Connected`, `ReplayPrompt`, `Disconnected`) have no
    /// kind and are not routable through an
    /// [`EventRouter`](crate::router::EventRouter).
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::RoomData { .. } => Some(EventKind::RoomData),
            Self::NumberCalled { .. } => Some(EventKind::NewNumber),
            Self::GameOver { .. } => Some(EventKind::GameOver),
            Self::GameReset { .. } => Some(EventKind::GameReset),
            Self::ServerError { .. } => Some(EventKind::Error),
            Self::Connected | Self::ReplayPrompt | Self::Disconnected { .. } => None,
        }
    }
}

impl From<ServerEvent> for HousieEvent {
    fn from(event: ServerEvent) -> Self {
        match event {
            ServerEvent::RoomData(snapshot) => Self::RoomData { snapshot },
            ServerEvent::NewNumber { number, room_data } => Self::NumberCalled {
                number,
                snapshot: room_data,
            },
            ServerEvent::GameOver {
                number,
                room_data,
                username,
            } => Self::GameOver {
                number,
                snapshot: room_data,
                winner: username,
            },
            ServerEvent::GameReset(snapshot) => Self::GameReset { snapshot },
            ServerEvent::Error(payload) => Self::ServerError {
                message: payload.message().to_string(),
            },
        }
    }
}
