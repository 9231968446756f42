//! Room session state machine.
//!
//! [`SessionState`] holds everything the client owns: the current phase, the
//! provisional identity chosen before joining, the latest authoritative
//! [`RoomSnapshot`], and the post-win prompt flag. All mutation happens in
//! [`SessionState::apply`] (inbound engine events), [`SessionState::prompt_fired`]
//! (scheduler), and the replay-prompt intents — one call per inbound message,
//! so every field touched by a message is updated atomically.
//!
//! The engine is the sole source of truth: `apply` wholesale-replaces the
//! snapshot on every push and never merges partial deltas, and the session
//! only leaves `Lobby` when a `room-data` push confirms membership.

use crate::error::{HousieError, Result};
use crate::protocol::{RoomSnapshot, ServerEvent};

/// Which screen the session is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not in a room. Initial state, and the state after declining a replay.
    #[default]
    Lobby,
    /// In a room, rendering the latest snapshot.
    InRoom,
}

/// Locally chosen identity, provisional until the engine confirms it with a
/// `room-data` push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Username the player entered in the lobby.
    pub username: String,
    /// Room code sent with the create/join intent.
    pub room_id: String,
}

/// What the transport loop should do with the replay-prompt timer after an
/// event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// A winner was recorded: arm the prompt timer (no-op if already armed).
    Arm,
    /// The winner was cleared: cancel any pending fire.
    Cancel,
    /// Leave the timer alone.
    None,
}

/// Client-owned session state.
///
/// Readers must treat the snapshot as immutable between updates; it is
/// replaced on write, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: Phase,
    identity: Option<Identity>,
    snapshot: Option<RoomSnapshot>,
    last_number: Option<u8>,
    winner: Option<String>,
    prompt_armed: bool,
}

impl SessionState {
    /// Fresh session in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The provisional identity, if an intent has been dispatched.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The latest authoritative snapshot, if any push has arrived.
    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.snapshot.as_ref()
    }

    /// The confirmed room code, once the engine has pushed a snapshot.
    pub fn room_code(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.room_id.as_str())
    }

    /// The most recently drawn number.
    pub fn last_number(&self) -> Option<u8> {
        self.last_number
    }

    /// The declared winner, if the game has ended.
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Whether the "play again?" prompt is currently showing.
    pub fn prompt_armed(&self) -> bool {
        self.prompt_armed
    }

    /// Derived game status: finished once a winner has been announced.
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Whether `number` sits marked on the winner's ticket.
    ///
    /// Pure projection over `(snapshot, winner)`, recomputed on every read —
    /// there is no cached second copy that could drift from the snapshot.
    pub fn is_winning_number(&self, number: u8) -> bool {
        match (&self.winner, &self.snapshot) {
            (Some(winner), Some(snapshot)) => snapshot.is_marked_by(winner, number),
            _ => false,
        }
    }

    // ── Local intents ───────────────────────────────────────────────

    /// Record the provisional identity for a create/join intent.
    ///
    /// The phase stays `Lobby` until the engine confirms with `room-data`;
    /// the client never assumes membership from the absence of an error.
    pub fn begin_intent(&mut self, username: String, room_id: String) {
        self.identity = Some(Identity { username, room_id });
    }

    /// Decline the post-win replay prompt: discard the room and return to a
    /// pristine lobby session.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::NoPromptActive`] if no prompt is showing.
    pub fn decline_replay(&mut self) -> Result<()> {
        if !self.prompt_armed {
            return Err(HousieError::NoPromptActive);
        }
        *self = Self::new();
        Ok(())
    }

    // ── Inbound events ──────────────────────────────────────────────

    /// Apply one inbound engine event.
    ///
    /// Every field the event carries is written in this single call, so a
    /// `game-over` can never be observed with the winner set but the snapshot
    /// stale. Returns the [`TimerAction`] the caller must forward to the
    /// replay-prompt scheduler.
    pub fn apply(&mut self, event: &ServerEvent) -> TimerAction {
        match event {
            ServerEvent::RoomData(snapshot) => {
                self.replace_snapshot(snapshot);
                self.phase = Phase::InRoom;
                TimerAction::None
            }
            ServerEvent::NewNumber { number, room_data } => {
                // Draws are only meaningful once membership is confirmed.
                if self.phase == Phase::InRoom {
                    self.last_number = Some(*number);
                    self.replace_snapshot(room_data);
                }
                TimerAction::None
            }
            ServerEvent::GameOver {
                number,
                room_data,
                username,
            } => {
                if self.phase == Phase::InRoom {
                    self.last_number = Some(*number);
                    self.replace_snapshot(room_data);
                    self.winner = Some(username.clone());
                    TimerAction::Arm
                } else {
                    TimerAction::None
                }
            }
            ServerEvent::GameReset(snapshot) => {
                self.replace_snapshot(snapshot);
                self.phase = Phase::InRoom;
                self.winner = None;
                self.last_number = None;
                self.prompt_armed = false;
                TimerAction::Cancel
            }
            // Surfaced to the user by the caller; no state mutation.
            ServerEvent::Error(_) => TimerAction::None,
        }
    }

    /// The replay-prompt timer fired. Returns `true` if the prompt actually
    /// armed.
    ///
    /// A fire that raced a `game-reset` (winner already cleared) or a
    /// duplicate fire while the prompt is showing is ignored.
    pub fn prompt_fired(&mut self) -> bool {
        if self.winner.is_some() && !self.prompt_armed {
            self.prompt_armed = true;
            true
        } else {
            false
        }
    }

    fn replace_snapshot(&mut self, snapshot: &RoomSnapshot) {
        self.snapshot = Some(snapshot.clone());
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::Player;

    fn snapshot(room: &str, numbers: &[u8]) -> RoomSnapshot {
        RoomSnapshot {
            room_id: room.into(),
            players: vec![Player {
                username: "alice".into(),
                ticket: (1..=15).collect(),
                marks: numbers.to_vec(),
            }],
            numbers_called: numbers.to_vec(),
        }
    }

    #[test]
    fn starts_in_lobby_with_nothing_set() {
        let session = SessionState::new();
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.snapshot().is_none());
        assert!(session.last_number().is_none());
        assert!(session.winner().is_none());
        assert!(!session.prompt_armed());
        assert!(!session.is_finished());
    }

    #[test]
    fn room_data_enters_room_and_replaces_snapshot() {
        let mut session = SessionState::new();
        let action = session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        assert_eq!(action, TimerAction::None);
        assert_eq!(session.phase(), Phase::InRoom);
        assert_eq!(session.room_code(), Some("AB12CD"));
        assert!(session.last_number().is_none());
    }

    #[test]
    fn new_number_updates_last_number_and_snapshot_together() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        session.apply(&ServerEvent::NewNumber {
            number: 7,
            room_data: snapshot("AB12CD", &[7]),
        });
        assert_eq!(session.last_number(), Some(7));
        assert_eq!(session.snapshot().unwrap().numbers_called, vec![7]);
    }

    #[test]
    fn new_number_in_lobby_is_ignored() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::NewNumber {
            number: 7,
            room_data: snapshot("AB12CD", &[7]),
        });
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.last_number().is_none());
        assert!(session.snapshot().is_none());
    }

    #[test]
    fn game_over_sets_winner_number_and_snapshot_atomically() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        let action = session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        assert_eq!(action, TimerAction::Arm);
        assert_eq!(session.winner(), Some("alice"));
        assert_eq!(session.last_number(), Some(42));
        assert!(session.snapshot().unwrap().is_called(42));
        assert!(session.is_finished());
        // Prompt arms only after the timer fires.
        assert!(!session.prompt_armed());
    }

    #[test]
    fn game_reset_clears_winner_prompt_and_last_number() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        assert!(session.prompt_fired());

        let action = session.apply(&ServerEvent::GameReset(snapshot("AB12CD", &[])));
        assert_eq!(action, TimerAction::Cancel);
        assert_eq!(session.phase(), Phase::InRoom);
        assert!(session.winner().is_none());
        assert!(session.last_number().is_none());
        assert!(!session.prompt_armed());
        assert!(session.snapshot().unwrap().numbers_called.is_empty());
    }

    #[test]
    fn error_event_mutates_nothing() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[3])));
        let before = session.clone();
        let action = session.apply(&ServerEvent::Error(crate::protocol::ErrorPayload::Bare(
            "room not found".into(),
        )));
        assert_eq!(action, TimerAction::None);
        assert_eq!(session.phase(), before.phase());
        assert_eq!(session.snapshot(), before.snapshot());
        assert_eq!(session.winner(), before.winner());
    }

    #[test]
    fn prompt_fired_is_ignored_without_winner() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        assert!(!session.prompt_fired());
        assert!(!session.prompt_armed());
    }

    #[test]
    fn stale_fire_after_reset_does_not_arm() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        session.apply(&ServerEvent::GameReset(snapshot("AB12CD", &[])));
        // The timer's fire arrives after the reset already cleared the winner.
        assert!(!session.prompt_fired());
        assert!(!session.prompt_armed());
    }

    #[test]
    fn duplicate_fire_arms_only_once() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        assert!(session.prompt_fired());
        assert!(!session.prompt_fired());
        assert!(session.prompt_armed());
    }

    #[test]
    fn decline_replay_requires_prompt() {
        let mut session = SessionState::new();
        let err = session.decline_replay().unwrap_err();
        assert!(matches!(err, HousieError::NoPromptActive));
    }

    #[test]
    fn decline_replay_resets_to_pristine_lobby() {
        let mut session = SessionState::new();
        session.begin_intent("alice".into(), "AB12CD".into());
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        session.prompt_fired();

        session.decline_replay().unwrap();
        assert_eq!(session.phase(), Phase::Lobby);
        assert!(session.identity().is_none());
        assert!(session.snapshot().is_none());
        assert!(session.winner().is_none());
        assert!(session.last_number().is_none());
        assert!(!session.prompt_armed());
    }

    #[test]
    fn begin_intent_stays_in_lobby_until_confirmed() {
        let mut session = SessionState::new();
        session.begin_intent("alice".into(), "AB12CD".into());
        assert_eq!(session.phase(), Phase::Lobby);
        assert_eq!(session.identity().unwrap().room_id, "AB12CD");
        assert!(session.room_code().is_none());
    }

    #[test]
    fn winning_number_projection_tracks_snapshot() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[])));
        assert!(!session.is_winning_number(42));

        session.apply(&ServerEvent::GameOver {
            number: 42,
            room_data: snapshot("AB12CD", &[42]),
            username: "alice".into(),
        });
        assert!(session.is_winning_number(42));
        assert!(!session.is_winning_number(41));

        session.apply(&ServerEvent::GameReset(snapshot("AB12CD", &[])));
        assert!(!session.is_winning_number(42));
    }

    #[test]
    fn snapshot_is_wholesale_replaced() {
        let mut session = SessionState::new();
        session.apply(&ServerEvent::RoomData(snapshot("AB12CD", &[1, 2, 3])));
        // The next push carries a shorter history; the client keeps exactly
        // what the engine sent, never a local merge.
        session.apply(&ServerEvent::GameReset(snapshot("AB12CD", &[])));
        assert!(session.snapshot().unwrap().numbers_called.is_empty());
    }
}
