//! # Custom Transport Example
//!
//! Shows how to implement the [`Transport`] trait with a simple in-process
//! loopback channel. This is useful for:
//!
//! - **Testing** — exercise your game UI without a real engine
//! - **Custom backends** — adapt any I/O layer (TCP, QUIC, WebRTC data channels)
//!
//! ## Running
//!
//! ```sh
//! cargo run --example custom_transport
//! ```

use async_trait::async_trait;
use housie_client::{HousieClient, HousieConfig, HousieError, HousieEvent, Transport};
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: Define a channel-based "loopback" transport
// ─────────────────────────────────────────────────────────────────────

/// A loopback transport that shuttles messages through in-process channels.
///
/// This transport consists of two halves:
/// - The **client half** (`LoopbackTransport`) implements [`Transport`] and is
///   handed to `HousieClient::start`.
/// - The **engine half** (`LoopbackEngine`) lets you inject pushes and read
///   what the client sent — perfect for testing.
pub struct LoopbackTransport {
    /// Messages the client sends go here (engine reads from the other end).
    tx: mpsc::UnboundedSender<String>,
    /// Messages the engine sends arrive here (client reads them).
    rx: mpsc::UnboundedReceiver<String>,
}

/// The "engine side" of the loopback — use this to drive the conversation.
pub struct LoopbackEngine {
    /// Read what the client sent.
    pub rx: mpsc::UnboundedReceiver<String>,
    /// Send pushes to the client (as if they came from a real engine).
    pub tx: mpsc::UnboundedSender<String>,
}

/// Create a connected `(transport, engine)` pair.
fn loopback_pair() -> (LoopbackTransport, LoopbackEngine) {
    // Client → Engine channel
    let (client_tx, engine_rx) = mpsc::unbounded_channel();
    // Engine → Client channel
    let (engine_tx, client_rx) = mpsc::unbounded_channel();

    let transport = LoopbackTransport {
        tx: client_tx,
        rx: client_rx,
    };
    let engine = LoopbackEngine {
        rx: engine_rx,
        tx: engine_tx,
    };

    (transport, engine)
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Implement the Transport trait
// ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Transport for LoopbackTransport {
    /// Send a JSON message to the "engine" side of the loopback.
    async fn send(&mut self, message: String) -> Result<(), HousieError> {
        self.tx
            .send(message)
            .map_err(|e| HousieError::TransportSend(e.to_string()))
    }

    /// Receive the next message from the "engine" side.
    ///
    /// Returns `None` when the engine channel is closed — this is how the
    /// client discovers that the connection has ended.
    ///
    /// This method is **cancel-safe** because `mpsc::UnboundedReceiver::recv`
    /// is cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, HousieError>> {
        self.rx.recv().await.map(Ok)
    }

    /// Close is a no-op for channels — dropping is sufficient.
    async fn close(&mut self) -> Result<(), HousieError> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 3: Wire together the client and the fake engine
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for readable output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Create the loopback pair.
    let (transport, mut engine) = loopback_pair();

    // Start the client and ask for a room.
    let (mut client, mut event_rx) = HousieClient::start(transport, HousieConfig::new());
    let code = client.create_room("RustPlayer").await?;
    tracing::info!("Requested room {code}");

    // ── Fake engine: read the create-room intent and confirm ────────
    let Some(create_msg) = engine.rx.recv().await else {
        return Err("engine channel closed before create-room was received".into());
    };
    tracing::info!("Engine received: {create_msg}");

    // Respond with a room-data push (the JSON must match the engine's wire
    // format — adjacently-tagged: {"event": "room-data", "data": {…}}).
    let confirmation = serde_json::json!({
        "event": "room-data",
        "data": {
            "roomID": code,
            "players": [
                {"username": "RustPlayer", "ticket": [4, 9, 17, 22, 31, 38, 45, 51, 56, 63, 67, 74, 79, 83, 90], "marks": []}
            ],
            "numbersCalled": []
        }
    });
    engine.tx.send(confirmation.to_string())?;

    // ── Read events from the client ─────────────────────────────────
    // We expect Connected (synthetic) and then RoomData.
    let mut events_seen = 0;
    while let Some(event) = event_rx.recv().await {
        match &event {
            HousieEvent::Connected => {
                tracing::info!("Event: Connected (synthetic)");
            }
            HousieEvent::RoomData { snapshot } => {
                tracing::info!("Event: RoomData — room confirmed as {}", snapshot.room_id);
            }
            HousieEvent::Disconnected { reason } => {
                tracing::info!(
                    "Event: Disconnected — {}",
                    reason.as_deref().unwrap_or("clean")
                );
                break;
            }
            other => {
                tracing::info!("Event: {other:?}");
            }
        }

        events_seen += 1;
        // After seeing both events, shut down.
        if events_seen >= 2 {
            break;
        }
    }

    // ── Clean shutdown ──────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Done — saw {events_seen} event(s). Custom transport works!");
    Ok(())
}
