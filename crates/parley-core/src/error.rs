//! Error types for the Parley connection layer.
//!
//! Strongly-typed errors for connection state transitions and liveness
//! failures. Failures that end a session are also rendered into the `reason`
//! of [`crate::connection::ConnectionAction::Lost`], so their `Display` text
//! is what users and logs see.

use std::time::Duration;

use parley_proto::Command;
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Invalid state transition attempted
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Received a frame that is not valid in the current state
    #[error("unexpected {command} frame in state {state:?}")]
    UnexpectedFrame {
        /// Current state when frame was received
        state: ConnectionState,
        /// Command of the unexpected frame
        command: Command,
    },

    /// Broker did not answer CONNECT in time
    #[error("handshake timeout after {elapsed:?}")]
    HandshakeTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// No inbound traffic within the heart-beat grace window
    #[error("heartbeat timeout after {elapsed:?}")]
    HeartbeatTimeout {
        /// Time since the last inbound packet
        elapsed: Duration,
    },

    /// Broker sent an ERROR frame
    #[error("broker error: {0}")]
    Broker(String),

    /// Transport could not be opened or was dropped
    #[error("transport error: {0}")]
    Transport(String),

    /// Connection was torn down explicitly and will not reconnect
    #[error("connection shut down")]
    ShutDown,
}

impl ConnectionError {
    /// Returns true if this error is recovered by the reconnect loop.
    ///
    /// Only [`ConnectionError::ShutDown`] and local programming errors
    /// (invalid transitions) are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::HandshakeTimeout { .. }
                | Self::HeartbeatTimeout { .. }
                | Self::Broker(_)
                | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_failures_are_transient() {
        assert!(ConnectionError::HandshakeTimeout { elapsed: Duration::from_secs(11) }.is_transient());
        assert!(ConnectionError::HeartbeatTimeout { elapsed: Duration::from_secs(9) }.is_transient());
        assert!(ConnectionError::Transport("refused".into()).is_transient());
        assert!(ConnectionError::Broker("bad destination".into()).is_transient());
    }

    #[test]
    fn teardown_and_misuse_are_permanent() {
        assert!(!ConnectionError::ShutDown.is_transient());
        assert!(
            !ConnectionError::InvalidState {
                state: ConnectionState::Connected,
                operation: "connect",
            }
            .is_transient()
        );
        assert!(
            !ConnectionError::UnexpectedFrame {
                state: ConnectionState::Connecting,
                command: Command::Message,
            }
            .is_transient()
        );
    }
}
