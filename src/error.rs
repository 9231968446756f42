//! Error types for the housie client.

use thiserror::Error;

/// Errors that can occur when using the housie client.
#[derive(Debug, Error)]
pub enum HousieError {
    /// A local intent failed its precondition check before anything was sent.
    #[error("{0}")]
    Validation(String),

    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize a wire message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Attempted an operation that requires an active connection, but the client is not connected.
    #[error("not connected to the room engine")]
    NotConnected,

    /// Attempted a room operation but the session has no confirmed room.
    #[error("not in a room")]
    NotInRoom,

    /// A replay-prompt intent was issued while no replay prompt is showing.
    #[error("no replay prompt is active")]
    NoPromptActive,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for housie client operations.
pub type Result<T> = std::result::Result<T, HousieError>;
