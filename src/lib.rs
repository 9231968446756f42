//! # Housie Client
//!
//! Transport-agnostic Rust client for a realtime multiplayer housie (bingo)
//! room engine.
//!
//! The crate keeps a local mirror of one room's game in sync with the engine:
//! the engine is the single source of truth, every push carries a full room
//! snapshot, and the local state is replaced wholesale rather than patched.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **WebSocket built-in** — default `transport-websocket` feature provides [`WebSocketTransport`]
//! - **Event-driven** — receive typed [`HousieEvent`]s via a channel, or fan
//!   them out to per-kind handlers with an [`EventRouter`]
//! - **Replay prompt built-in** — the post-win "play again?" prompt arms on a
//!   cancellable timer owned by the client, never by the caller
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use housie_client::{HousieClient, HousieConfig, HousieEvent, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = WebSocketTransport::connect("ws://localhost:4000").await?;
//!     let (client, mut events) = HousieClient::start(transport, HousieConfig::new());
//!
//!     let code = client.create_room("Alice").await?;
//!     println!("share this room code: {code}");
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             HousieEvent::NumberCalled { number, .. } => println!("drawn: {number}"),
//!             HousieEvent::GameOver { winner, .. } => println!("{winner} wins!"),
//!             HousieEvent::Disconnected { .. } => break,
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod router;
pub mod scheduler;
pub mod session;
pub mod transport;

#[cfg(feature = "transport-websocket")]
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use client::{HousieClient, HousieConfig};
pub use error::HousieError;
pub use event::{EventKind, HousieEvent};
pub use protocol::{ClientIntent, Player, RoomSnapshot, ServerEvent};
pub use router::{Disposer, EventRouter};
pub use session::{Phase, SessionState};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::websocket::WebSocketTransport;
