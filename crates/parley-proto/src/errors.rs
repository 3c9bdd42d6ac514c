//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire data.
///
/// Every variant is local to a single packet. A decoding error never implies
/// the connection is broken; callers drop the packet and keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet contained no bytes at all.
    #[error("empty packet")]
    Empty,

    /// Command line or header block is not valid UTF-8.
    #[error("header block is not valid UTF-8")]
    InvalidUtf8,

    /// Command line did not name a known STOMP command.
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    /// Header line without a `:` separator.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// Header contained an undefined escape sequence.
    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    /// `content-length` header was not a valid length.
    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    /// Header block or body ended before the frame was complete.
    #[error("frame truncated")]
    Truncated,

    /// Body was not terminated by a NUL octet.
    #[error("frame body is not NUL-terminated")]
    MissingNul,

    /// A header required for this command was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Destination string did not match any known destination.
    #[error("unknown destination: {0:?}")]
    UnknownDestination(String),

    /// `heart-beat` header was not two comma-separated integers.
    #[error("invalid heart-beat header: {0:?}")]
    InvalidHeartBeat(String),

    /// Body failed to (de)serialize as the expected JSON payload.
    #[error("invalid JSON payload: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
