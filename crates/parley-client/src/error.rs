//! Client error types.

use parley_core::ConnectionError;
use parley_proto::ProtocolError;
use thiserror::Error;

/// Why sending is currently disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendBlocked {
    /// No live broker session.
    Disconnected,
    /// Loading history or creating the room failed for this conversation.
    HistoryFailed,
    /// Private room id not resolved yet.
    RoomPending,
}

impl std::fmt::Display for SendBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "not connected",
            Self::HistoryFailed => "conversation failed to load",
            Self::RoomPending => "conversation still opening",
        })
    }
}

/// Errors returned by [`crate::Client::handle`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Send attempted while sending is disabled.
    #[error("cannot send: {0}")]
    SendUnavailable(SendBlocked),

    /// Send attempted with blank content.
    #[error("message is empty")]
    EmptyMessage,

    /// Outbound payload could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Connection state machine rejected the operation.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}
