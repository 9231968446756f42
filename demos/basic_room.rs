//! # Basic Room Example
//!
//! Demonstrates a complete Housie client lifecycle:
//!
//! 1. Connect to a room engine via WebSocket
//! 2. Create a room and print the shareable code
//! 3. React to draws, wins, and the replay prompt
//! 4. Shut down gracefully on Ctrl+C or disconnect
//!
//! ## Running
//!
//! ```sh
//! # Start a housie engine on localhost:4000, then:
//! cargo run --example basic_room
//!
//! # Override the engine URL:
//! HOUSIE_URL=ws://my-engine:4000 cargo run --example basic_room
//! ```

use housie_client::{HousieClient, HousieConfig, HousieEvent, WebSocketTransport};

/// Default engine URL when `HOUSIE_URL` is not set.
const DEFAULT_URL: &str = "ws://localhost:4000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Initialize tracing. Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = std::env::var("HOUSIE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    tracing::info!("Connecting to {url}");

    // ── Connect ─────────────────────────────────────────────────────
    let transport = WebSocketTransport::connect(&url).await?;

    // Start the client. This spawns a background task that drives the
    // transport and emits events on `event_rx`.
    let (mut client, mut event_rx) = HousieClient::start(transport, HousieConfig::new());

    // Create a room. The code is provisional until the engine confirms
    // with a room-data push.
    let code = client.create_room("RustPlayer").await?;
    tracing::info!("Room requested — share this code: {code}");

    // ── Event loop ──────────────────────────────────────────────────
    // Use `tokio::select!` to listen for both engine events and Ctrl+C.
    loop {
        tokio::select! {
            // Branch 1: Incoming event from the engine (or transport layer).
            event = event_rx.recv() => {
                let Some(event) = event else {
                    // Channel closed — transport loop exited.
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    // ── Synthetic: transport connected ───────────────
                    HousieEvent::Connected => {
                        tracing::info!("Transport connected, awaiting room confirmation…");
                    }

                    // ── Room confirmed / roster changed ──────────────
                    HousieEvent::RoomData { snapshot } => {
                        tracing::info!(
                            "Room {} confirmed ({} player(s) present)",
                            snapshot.room_id,
                            snapshot.players.len()
                        );

                        // As the host, kick off the first draw.
                        client.call_next_number().await?;
                        tracing::info!("First draw requested");
                    }

                    // ── Game progress ────────────────────────────────
                    HousieEvent::NumberCalled { number, snapshot } => {
                        tracing::info!(
                            "Number called: {number} ({} drawn so far)",
                            snapshot.numbers_called.len()
                        );
                    }

                    HousieEvent::GameOver { number, winner, .. } => {
                        tracing::info!("{winner} wins on {number}!");
                    }

                    // ── Replay prompt (arms a few seconds after the win)
                    HousieEvent::ReplayPrompt => {
                        tracing::info!("Play again? Accepting…");
                        client.accept_replay().await?;
                    }

                    HousieEvent::GameReset { .. } => {
                        tracing::info!("Fresh game started");
                        client.call_next_number().await?;
                    }

                    // ── Errors from the engine ───────────────────────
                    HousieEvent::ServerError { message } => {
                        tracing::error!("Engine error: {message}");
                    }

                    // ── Disconnect ───────────────────────────────────
                    HousieEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("unknown"));
                        break;
                    }
                }
            }

            // Branch 2: Ctrl+C — shut down gracefully.
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
