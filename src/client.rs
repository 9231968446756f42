//! Async client for the housie room engine.
//!
//! [`HousieClient`] is a thin handle that communicates with a background
//! transport loop task via an unbounded MPSC channel. Events are emitted on a
//! bounded channel ([`tokio::sync::mpsc::Receiver<HousieEvent>`]) returned
//! from [`HousieClient::start`]. The loop owns the session state machine and
//! the replay-prompt timer, so every state mutation is serialized through one
//! writer context.
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = WebSocketTransport::connect(url).await?;
//! let (client, mut events) = HousieClient::start(transport, HousieConfig::new());
//!
//! let code = client.create_room("Alice").await?;
//! println!("room code: {code}");
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         HousieEvent::RoomData { snapshot } => { /* render */ }
//!         HousieEvent::Disconnected { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::error::{HousieError, Result};
use crate::event::HousieEvent;
use crate::protocol::{normalize_room_code, ClientIntent, RoomSnapshot, ServerEvent, ROOM_CODE_LEN};
use crate::scheduler::{ReplayPromptScheduler, DEFAULT_PROMPT_DELAY};
use crate::session::{Phase, SessionState, TimerAction};
use crate::transport::Transport;

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Alphabet room codes are drawn from, uniformly.
const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`HousieClient`] connection.
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use housie_client::client::HousieConfig;
/// use std::time::Duration;
///
/// let config = HousieConfig::new()
///     .with_event_channel_capacity(512)
///     .with_prompt_delay(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct HousieConfig {
    /// Capacity of the bounded event channel.
    ///
    /// When the consumer cannot keep up with incoming engine pushes, events
    /// are dropped (with a warning logged) to avoid blocking the transport
    /// loop. The `Disconnected` event is always delivered regardless of
    /// capacity.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Timeout for the graceful shutdown.
    ///
    /// When [`HousieClient::shutdown`] is called, the background transport
    /// loop is given this much time to close the transport and emit a final
    /// `Disconnected` event. If the timeout expires the task is aborted.
    ///
    /// Defaults to **1 second**.
    pub shutdown_timeout: Duration,
    /// How long after a winner announcement the "play again?" prompt appears.
    ///
    /// Defaults to **5 seconds**.
    pub prompt_delay: Duration,
}

impl HousieConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            prompt_delay: DEFAULT_PROMPT_DELAY,
        }
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the delay between a winner announcement and the replay prompt.
    #[must_use]
    pub fn with_prompt_delay(mut self, delay: Duration) -> Self {
        self.prompt_delay = delay;
        self
    }
}

impl Default for HousieConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Internal shared state between the client handle and the transport loop.
struct ClientShared {
    connected: AtomicBool,
    session: Mutex<SessionState>,
}

impl ClientShared {
    fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            session: Mutex::new(SessionState::new()),
        }
    }
}

// ── Client handle ───────────────────────────────────────────────────

/// Async client handle for the housie room engine.
///
/// Created via [`HousieClient::start`], which spawns a background transport
/// loop and returns this handle together with an event receiver.
///
/// Intent methods validate their preconditions locally, then serialize a
/// [`ClientIntent`] and queue it to the transport loop. They return once the
/// message is queued (no round-trip await): the engine confirms success with
/// a subsequent push, never with silence.
pub struct HousieClient {
    /// Sender half of the intent channel to the transport loop.
    cmd_tx: mpsc::UnboundedSender<ClientIntent>,
    /// Shared state updated by the transport loop.
    shared: Arc<ClientShared>,
    /// Handle to the background transport loop task.
    task: Option<tokio::task::JoinHandle<()>>,
    /// Oneshot sender to signal the transport loop to shut down gracefully.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Timeout for the graceful shutdown.
    shutdown_timeout: Duration,
}

impl HousieClient {
    /// Start the client transport loop and return a handle plus event receiver.
    ///
    /// # Arguments
    ///
    /// * `transport` — A connected [`Transport`] implementation.
    /// * `config` — Client configuration.
    ///
    /// # Returns
    ///
    /// A tuple of `(client_handle, event_receiver)`. The event receiver yields
    /// [`HousieEvent`]s until the transport closes or the client shuts down.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        config: HousieConfig,
    ) -> (Self, mpsc::Receiver<HousieEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ClientIntent>();
        // Clamp capacity to at least 1 (tokio panics on 0).
        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel::<HousieEvent>(capacity);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let shared = Arc::new(ClientShared::new());
        let loop_shared = Arc::clone(&shared);

        let task = tokio::spawn(transport_loop(
            transport,
            cmd_rx,
            event_tx,
            loop_shared,
            shutdown_rx,
            config.prompt_delay,
        ));

        let client = Self {
            cmd_tx,
            shared,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
        };

        (client, event_rx)
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Create a new room and join it as the first player.
    ///
    /// Generates a fresh [`ROOM_CODE_LEN`]-character uppercase alphanumeric
    /// room code and returns it. The code is provisional: the session stays in
    /// the lobby until the engine confirms with a `room-data` push.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::Validation`] if `username` is empty or the
    /// session is already in a room, or [`HousieError::NotConnected`] if the
    /// transport has closed.
    pub async fn create_room(&self, username: &str) -> Result<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(HousieError::Validation("enter a username first".into()));
        }
        let room_id = generate_room_code();
        {
            let mut session = self.shared.session.lock().await;
            if session.phase() == Phase::InRoom {
                return Err(HousieError::Validation("already in a room".into()));
            }
            session.begin_intent(username.to_string(), room_id.clone());
        }
        self.send(ClientIntent::CreateRoom {
            room_id: room_id.clone(),
            username: username.to_string(),
        })?;
        Ok(room_id)
    }

    /// Join an existing room by code.
    ///
    /// The code is case-normalized before sending. The session stays in the
    /// lobby until the engine confirms with a `room-data` push.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::Validation`] if `username` or `room_code` is
    /// empty or the session is already in a room, or
    /// [`HousieError::NotConnected`] if the transport has closed.
    pub async fn join_room(&self, username: &str, room_code: &str) -> Result<()> {
        let username = username.trim();
        let room_id = normalize_room_code(room_code);
        if username.is_empty() || room_id.is_empty() {
            return Err(HousieError::Validation(
                "enter a username and a room code first".into(),
            ));
        }
        {
            let mut session = self.shared.session.lock().await;
            if session.phase() == Phase::InRoom {
                return Err(HousieError::Validation("already in a room".into()));
            }
            session.begin_intent(username.to_string(), room_id.clone());
        }
        self.send(ClientIntent::JoinRoom {
            room_id,
            username: username.to_string(),
        })
    }

    /// Request the next draw for the current room.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::NotInRoom`] if no `room-data` push has confirmed
    /// membership yet, or [`HousieError::NotConnected`] if the transport has
    /// closed.
    pub async fn call_next_number(&self) -> Result<()> {
        let room_id = {
            let session = self.shared.session.lock().await;
            session
                .room_code()
                .map(str::to_string)
                .ok_or(HousieError::NotInRoom)?
        };
        self.send(ClientIntent::GenerateNumber(room_id))
    }

    /// Accept the post-win replay prompt: ask the engine for a fresh game.
    ///
    /// The local state does not change here — it changes when the engine's
    /// `game-reset` push arrives.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::NoPromptActive`] if the prompt is not showing,
    /// [`HousieError::NotInRoom`] if there is no confirmed room, or
    /// [`HousieError::NotConnected`] if the transport has closed.
    pub async fn accept_replay(&self) -> Result<()> {
        let room_id = {
            let session = self.shared.session.lock().await;
            if !session.prompt_armed() {
                return Err(HousieError::NoPromptActive);
            }
            session
                .room_code()
                .map(str::to_string)
                .ok_or(HousieError::NotInRoom)?
        };
        self.send(ClientIntent::ResetGame(room_id))
    }

    /// Decline the post-win replay prompt: discard the room locally and
    /// return to a pristine lobby session. Nothing is sent to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`HousieError::NoPromptActive`] if the prompt is not showing.
    pub async fn decline_replay(&self) -> Result<()> {
        self.shared.session.lock().await.decline_replay()
    }

    /// Shut down the client, closing the transport and stopping the background task.
    ///
    /// After calling this method, the event receiver will yield `None` once
    /// the transport loop exits.
    pub async fn shutdown(&mut self) {
        debug!("HousieClient: shutdown requested");

        // Signal the transport loop to shut down gracefully.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        // Await the transport loop with a timeout. If it doesn't exit in time,
        // abort it so the task cannot detach and run indefinitely.
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("transport loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("transport loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("transport loop aborted: {join_err}");
                    }
                }
            }
        }

        self.shared.connected.store(false, Ordering::Release);
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Returns `true` if the transport is believed to be connected.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Current session phase.
    pub async fn phase(&self) -> Phase {
        self.shared.session.lock().await.phase()
    }

    /// The latest authoritative room snapshot, if any.
    pub async fn snapshot(&self) -> Option<RoomSnapshot> {
        self.shared.session.lock().await.snapshot().cloned()
    }

    /// The confirmed room code, once the engine has pushed one.
    pub async fn current_room_code(&self) -> Option<String> {
        self.shared
            .session
            .lock()
            .await
            .room_code()
            .map(str::to_string)
    }

    /// The most recently drawn number.
    pub async fn last_number(&self) -> Option<u8> {
        self.shared.session.lock().await.last_number()
    }

    /// The declared winner, if the game has ended.
    pub async fn winner(&self) -> Option<String> {
        self.shared.session.lock().await.winner().map(str::to_string)
    }

    /// Whether the "play again?" prompt is currently showing.
    pub async fn is_prompt_armed(&self) -> bool {
        self.shared.session.lock().await.prompt_armed()
    }

    /// A point-in-time copy of the whole session, for rendering.
    pub async fn session(&self) -> SessionState {
        self.shared.session.lock().await.clone()
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// Queue a `ClientIntent` to the transport loop.
    fn send(&self, intent: ClientIntent) -> Result<()> {
        if !self.shared.connected.load(Ordering::Acquire) {
            return Err(HousieError::NotConnected);
        }
        self.cmd_tx
            .send(intent)
            .map_err(|_| HousieError::NotConnected)
    }
}

impl std::fmt::Debug for HousieClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HousieClient")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for HousieClient {
    fn drop(&mut self) {
        // `Drop` is synchronous so we cannot await a graceful shutdown.
        // The only safe action is to abort the spawned task, which causes
        // the transport loop future to be dropped immediately.  The
        // `shutdown_tx` oneshot is intentionally *not* sent here: sending
        // it would trigger a graceful path that calls async `transport.close()`,
        // but there is no executor context to drive it inside `Drop`.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Generate a fresh room code: [`ROOM_CODE_LEN`] characters drawn uniformly
/// from the uppercase alphanumeric alphabet.
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_CHARSET.len());
            ROOM_CODE_CHARSET.get(idx).copied().unwrap_or(b'A') as char
        })
        .collect()
}

// ── Transport loop ──────────────────────────────────────────────────

/// Background transport loop that multiplexes send/receive via `tokio::select!`.
///
/// Owns the [`ReplayPromptScheduler`], so the prompt timer can never outlive
/// the loop: every exit path cancels it along with closing the transport.
///
/// Exits when:
/// - The intent channel closes (client handle dropped or shutdown called)
/// - The transport returns `None` (engine closed the connection)
/// - A transport error occurs
async fn transport_loop(
    mut transport: impl Transport,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientIntent>,
    event_tx: mpsc::Sender<HousieEvent>,
    shared: Arc<ClientShared>,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    prompt_delay: Duration,
) {
    debug!("transport loop started");

    let (fire_tx, mut fire_rx) = mpsc::unbounded_channel::<()>();
    let mut prompt = ReplayPromptScheduler::new(prompt_delay, fire_tx);

    // Emit the synthetic Connected event before entering the select loop.
    emit_event(&event_tx, HousieEvent::Connected).await;

    loop {
        tokio::select! {
            // Branch 1: outgoing intent from the client handle
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(intent) => {
                        debug!("sending client intent: {:?}", std::mem::discriminant(&intent));
                        match serde_json::to_string(&intent) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    emit_disconnected(
                                        &event_tx,
                                        &shared,
                                        Some(format!("transport send error: {e}")),
                                    ).await;
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("failed to serialize ClientIntent: {e}");
                                // Serialization errors are programming bugs; don't kill the loop.
                            }
                        }
                    }
                    // Intent channel closed — client handle dropped.
                    None => {
                        debug!("intent channel closed, shutting down transport loop");
                        let _ = transport.close().await;
                        emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // Branch 2: shutdown signal
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                emit_disconnected(&event_tx, &shared, Some("client shut down".into())).await;
                break;
            }

            // Branch 3: the replay-prompt timer fired
            Some(()) = fire_rx.recv() => {
                // The session ignores a fire that raced a reset (winner gone).
                let armed = shared.session.lock().await.prompt_fired();
                if armed {
                    debug!("replay prompt armed");
                    emit_event(&event_tx, HousieEvent::ReplayPrompt).await;
                }
            }

            // Branch 4: incoming push from the engine
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                // Apply to the session, then drive the timer —
                                // both before the consumer sees the event.
                                let action = shared.session.lock().await.apply(&event);
                                match action {
                                    TimerAction::Arm => prompt.arm(),
                                    TimerAction::Cancel => prompt.cancel(),
                                    TimerAction::None => {}
                                }
                                emit_event(&event_tx, HousieEvent::from(event)).await;
                            }
                            Err(e) => {
                                warn!("failed to deserialize engine event: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        emit_disconnected(
                            &event_tx,
                            &shared,
                            Some(format!("transport receive error: {e}")),
                        ).await;
                        break;
                    }
                    // Transport closed cleanly.
                    None => {
                        debug!("transport closed by engine");
                        emit_disconnected(&event_tx, &shared, None).await;
                        break;
                    }
                }
            }
        }
    }

    // No exit path may leave the timer pending — partial teardown is a defect.
    prompt.cancel();
    debug!("transport loop exited");
}

/// Emit an event to the event channel. If the channel is full, log a warning
/// and drop the event to avoid blocking the transport loop.
async fn emit_event(event_tx: &mpsc::Sender<HousieEvent>, event: HousieEvent) {
    match event_tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!(
                "event channel full, dropping event: {:?}",
                std::mem::discriminant(&dropped)
            );
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

/// Emit a [`Disconnected`](HousieEvent::Disconnected) event and update state.
///
/// Uses `send().await` (blocking) instead of `try_send` because `Disconnected`
/// is always the last event on the channel and must never be silently dropped.
async fn emit_disconnected(
    event_tx: &mpsc::Sender<HousieEvent>,
    shared: &ClientShared,
    reason: Option<String>,
) {
    shared.connected.store(false, Ordering::Release);
    let event = HousieEvent::Disconnected { reason };
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport ──────────────────────────────────────────────

    /// A mock transport that records sent messages and replays scripted responses.
    struct MockTransport {
        /// Messages that `recv()` will yield in order.
        incoming: VecDeque<Option<std::result::Result<String, HousieError>>>,
        /// Recorded outgoing messages.
        sent: Arc<StdMutex<Vec<String>>>,
        /// Whether `close()` was called.
        closed: Arc<AtomicBool>,
    }

    impl MockTransport {
        fn new(
            incoming: Vec<Option<std::result::Result<String, HousieError>>>,
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
        async fn send(&mut self, message: String) -> std::result::Result<(), HousieError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, HousieError>> {
            if let Some(item) = self.incoming.pop_front() {
                // An explicit `None` entry signals a clean transport close;
                // `Some(result)` delivers the scripted message or error.
                item
            } else {
                // All scripted messages have been delivered — hang forever
                // so the transport loop stays alive until shutdown.
                std::future::pending().await
            }
        }

        async fn close(&mut self) -> std::result::Result<(), HousieError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

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

    fn room_data_json(room: &str, numbers: &[u8]) -> String {
        serde_json::to_string(&ServerEvent::RoomData(snapshot(room, numbers))).unwrap()
    }

    fn game_over_json(room: &str, number: u8, winner: &str) -> String {
        serde_json::to_string(&ServerEvent::GameOver {
            number,
            room_data: snapshot(room, &[number]),
            username: winner.into(),
        })
        .unwrap()
    }

    fn game_reset_json(room: &str) -> String {
        serde_json::to_string(&ServerEvent::GameReset(snapshot(room, &[]))).unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn connected_is_first_event() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        let first = events.recv().await.unwrap();
        assert!(
            matches!(first, HousieEvent::Connected),
            "expected Connected as first event, got {first:?}"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn create_room_rejects_empty_username() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        let err = client.create_room("   ").await.unwrap_err();
        assert!(matches!(err, HousieError::Validation(_)));
        // Nothing was sent.
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn create_room_sends_intent_with_generated_code() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        let code = client.create_room("alice").await.unwrap();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));

        settle().await;
        {
            let messages = sent.lock().unwrap();
            let intent: ClientIntent = serde_json::from_str(&messages[0]).unwrap();
            if let ClientIntent::CreateRoom { room_id, username } = intent {
                assert_eq!(room_id, code);
                assert_eq!(username, "alice");
            } else {
                panic!("expected CreateRoom intent, got {intent:?}");
            }
        }

        // The session stays in the lobby until the engine confirms.
        assert_eq!(client.phase().await, Phase::Lobby);
        assert!(client.current_room_code().await.is_none());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_room_normalizes_the_code() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        client.join_room("bob", " ab12cd ").await.unwrap();

        settle().await;
        {
            let messages = sent.lock().unwrap();
            let intent: ClientIntent = serde_json::from_str(&messages[0]).unwrap();
            if let ClientIntent::JoinRoom { room_id, username } = intent {
                assert_eq!(room_id, "AB12CD");
                assert_eq!(username, "bob");
            } else {
                panic!("expected JoinRoom intent, got {intent:?}");
            }
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn join_room_rejects_missing_fields() {
        let (transport, sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        assert!(matches!(
            client.join_room("", "AB12CD").await,
            Err(HousieError::Validation(_))
        ));
        assert!(matches!(
            client.join_room("bob", "  ").await,
            Err(HousieError::Validation(_))
        ));
        assert!(sent.lock().unwrap().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn room_data_confirms_membership() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(room_data_json("AB12CD", &[])))]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, HousieEvent::RoomData { .. }));

        assert_eq!(client.phase().await, Phase::InRoom);
        assert_eq!(client.current_room_code().await.as_deref(), Some("AB12CD"));
        assert!(client.last_number().await.is_none());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn call_next_number_requires_a_confirmed_room() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        let err = client.call_next_number().await.unwrap_err();
        assert!(matches!(err, HousieError::NotInRoom));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn call_next_number_sends_the_confirmed_room_code() {
        let (transport, sent, _closed) =
            MockTransport::new(vec![Some(Ok(room_data_json("AB12CD", &[])))]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData

        client.call_next_number().await.unwrap();
        settle().await;
        {
            let messages = sent.lock().unwrap();
            let last: ClientIntent = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert_eq!(last, ClientIntent::GenerateNumber("AB12CD".into()));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn game_over_arms_the_prompt_after_the_delay() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(room_data_json("AB12CD", &[]))),
            Some(Ok(game_over_json("AB12CD", 42, "bob"))),
        ]);
        let config = HousieConfig::new().with_prompt_delay(Duration::from_millis(40));
        let (mut client, mut events) = HousieClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData
        let ev = events.recv().await.unwrap(); // GameOver
        if let HousieEvent::GameOver { number, winner, .. } = ev {
            assert_eq!(number, 42);
            assert_eq!(winner, "bob");
        } else {
            panic!("expected GameOver, got {ev:?}");
        }

        // Winner and last number are visible immediately, the prompt is not.
        assert_eq!(client.winner().await.as_deref(), Some("bob"));
        assert_eq!(client.last_number().await, Some(42));
        assert!(!client.is_prompt_armed().await);

        // After the delay the prompt arms and the event is emitted.
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, HousieEvent::ReplayPrompt));
        assert!(client.is_prompt_armed().await);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn game_reset_before_the_delay_cancels_the_prompt() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(room_data_json("AB12CD", &[]))),
            Some(Ok(game_over_json("AB12CD", 42, "bob"))),
            Some(Ok(game_reset_json("AB12CD"))),
        ]);
        let config = HousieConfig::new().with_prompt_delay(Duration::from_millis(60));
        let (mut client, mut events) = HousieClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData
        let _ = events.recv().await; // GameOver
        let ev = events.recv().await.unwrap(); // GameReset
        assert!(matches!(ev, HousieEvent::GameReset { .. }));

        assert!(client.winner().await.is_none());
        assert!(client.last_number().await.is_none());

        // Wait well past the original deadline: the prompt must never arm.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!client.is_prompt_armed().await);
        assert!(
            events.try_recv().is_err(),
            "no ReplayPrompt may be emitted after a reset"
        );

        client.shutdown().await;
    }

    #[tokio::test]
    async fn accept_replay_sends_reset_game() {
        let (transport, sent, _closed) = MockTransport::new(vec![
            Some(Ok(room_data_json("AB12CD", &[]))),
            Some(Ok(game_over_json("AB12CD", 42, "bob"))),
        ]);
        let config = HousieConfig::new().with_prompt_delay(Duration::from_millis(10));
        let (mut client, mut events) = HousieClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData
        let _ = events.recv().await; // GameOver
        let _ = events.recv().await; // ReplayPrompt

        client.accept_replay().await.unwrap();
        settle().await;
        {
            let messages = sent.lock().unwrap();
            let last: ClientIntent = serde_json::from_str(messages.last().unwrap()).unwrap();
            assert_eq!(last, ClientIntent::ResetGame("AB12CD".into()));
        }
        // State change is deferred until the engine's game-reset arrives.
        assert_eq!(client.winner().await.as_deref(), Some("bob"));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn accept_replay_requires_the_prompt() {
        let (transport, _sent, _closed) =
            MockTransport::new(vec![Some(Ok(room_data_json("AB12CD", &[])))]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData

        let err = client.accept_replay().await.unwrap_err();
        assert!(matches!(err, HousieError::NoPromptActive));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn decline_replay_returns_to_a_pristine_lobby() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(room_data_json("AB12CD", &[]))),
            Some(Ok(game_over_json("AB12CD", 42, "bob"))),
        ]);
        let config = HousieConfig::new().with_prompt_delay(Duration::from_millis(10));
        let (mut client, mut events) = HousieClient::start(transport, config);

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData
        let _ = events.recv().await; // GameOver
        let _ = events.recv().await; // ReplayPrompt

        client.decline_replay().await.unwrap();
        assert_eq!(client.phase().await, Phase::Lobby);
        assert!(client.snapshot().await.is_none());
        assert!(client.winner().await.is_none());
        assert!(!client.is_prompt_armed().await);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn engine_error_is_surfaced_without_state_change() {
        let error_json =
            serde_json::to_string(&ServerEvent::Error(crate::protocol::ErrorPayload::Bare(
                "Room not found".into(),
            )))
            .unwrap();
        let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(error_json))]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        let _ = events.recv().await; // Connected
        let ev = events.recv().await.unwrap();
        if let HousieEvent::ServerError { message } = ev {
            assert_eq!(message, "Room not found");
        } else {
            panic!("expected ServerError, got {ev:?}");
        }
        assert_eq!(client.phase().await, Phase::Lobby);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn disconnected_on_transport_close() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok(room_data_json("AB12CD", &[]))),
            // Explicit None signals clean transport close.
            None,
        ]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        let _ = events.recv().await; // Connected
        let _ = events.recv().await; // RoomData
        let event = events.recv().await.unwrap(); // Disconnected
        assert!(matches!(event, HousieEvent::Disconnected { .. }));

        assert!(!client.is_connected());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn not_connected_error_after_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        let result = client.create_room("alice").await;
        assert!(matches!(result, Err(HousieError::NotConnected)));
    }

    #[tokio::test]
    async fn shutdown_emits_disconnected_and_closes_transport() {
        let (transport, _sent, closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        client.shutdown().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, HousieEvent::Disconnected { .. }));
        if let HousieEvent::Disconnected { reason } = event {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn double_shutdown_does_not_panic() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        client.shutdown().await;
        client.shutdown().await; // should not panic
    }

    #[tokio::test]
    async fn drop_without_explicit_shutdown() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        // Drop the client without calling shutdown.
        drop(client);

        // The transport loop should eventually exit; the event channel
        // will close. We just verify we don't hang or panic.
        while let Some(_event) = events.recv().await {}
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = HousieConfig::new();
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
        assert_eq!(config.prompt_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn config_builder_methods() {
        let config = HousieConfig::new()
            .with_event_channel_capacity(512)
            .with_shutdown_timeout(Duration::from_secs(5))
            .with_prompt_delay(Duration::from_millis(100));
        assert_eq!(config.event_channel_capacity, 512);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.prompt_delay, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn event_channel_capacity_is_clamped_to_one() {
        let config = HousieConfig::new().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }

    #[tokio::test]
    async fn event_channel_backpressure_does_not_block() {
        // More pushes than the event channel can hold, without a reader.
        let mut incoming: Vec<Option<std::result::Result<String, HousieError>>> = Vec::new();
        for i in 0..(DEFAULT_EVENT_CHANNEL_CAPACITY + 50) {
            incoming.push(Some(Ok(room_data_json("AB12CD", &[(i % 90 + 1) as u8]))));
        }
        incoming.push(None);

        let (transport, _sent, _closed) = MockTransport::new(incoming);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        // Don't read events immediately — let the channel fill up.
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Drain. The loop should have completed (possibly dropping events
        // due to backpressure) without blocking; Disconnected still arrives.
        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert!(matches!(last, Some(HousieEvent::Disconnected { .. })));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_push_is_skipped() {
        let (transport, _sent, _closed) = MockTransport::new(vec![
            Some(Ok("{not json".into())),
            Some(Ok(room_data_json("AB12CD", &[]))),
        ]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());

        let _ = events.recv().await; // Connected
        // The malformed line is logged and skipped; the next push still lands.
        let ev = events.recv().await.unwrap();
        assert!(matches!(ev, HousieEvent::RoomData { .. }));

        client.shutdown().await;
    }

    #[tokio::test]
    async fn generated_room_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..20).map(|_| generate_room_code()).collect();
        // 20 draws from 36^6 possibilities colliding down to one code would
        // mean the generator is broken.
        assert!(codes.len() > 1);
        for code in &codes {
            assert_eq!(code.len(), ROOM_CODE_LEN);
        }
    }

    #[tokio::test]
    async fn debug_impl_for_client() {
        let (transport, _sent, _closed) = MockTransport::new(vec![]);
        let (mut client, mut events) = HousieClient::start(transport, HousieConfig::new());
        let _ = events.recv().await; // Connected

        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("HousieClient"));
        assert!(debug_str.contains("connected"));

        client.shutdown().await;
    }
}
