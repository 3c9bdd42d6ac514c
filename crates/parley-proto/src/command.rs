//! STOMP commands.

use std::{fmt, str::FromStr};

use crate::errors::ProtocolError;

/// STOMP 1.2 commands used by Parley.
///
/// Transaction and acknowledgement commands are not part of the protocol
/// surface: subscriptions use `ack:auto` and sends are fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client opens a session.
    Connect,
    /// Alias for `CONNECT` accepted from older clients.
    Stomp,
    /// Broker accepts the session.
    Connected,
    /// Client publishes to a destination.
    Send,
    /// Client registers interest in a destination.
    Subscribe,
    /// Client drops a subscription.
    Unsubscribe,
    /// Client ends the session.
    Disconnect,
    /// Broker delivers a message for a subscription.
    Message,
    /// Broker acknowledges a frame that requested a receipt.
    Receipt,
    /// Broker reports a fatal session error.
    Error,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Disconnect => "DISCONNECT",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Whether header names and values are escaped for this command.
    ///
    /// STOMP 1.2 exempts `CONNECT` and `CONNECTED` frames from escaping.
    #[must_use]
    pub const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let command = match s {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!("MESSAGE".parse::<Command>(), Ok(Command::Message));
        assert!(matches!("message".parse::<Command>(), Err(ProtocolError::UnknownCommand(_))));
    }

    #[test]
    fn connect_frames_are_not_escaped() {
        assert!(!Command::Connect.escapes_headers());
        assert!(!Command::Connected.escapes_headers());
        assert!(Command::Message.escapes_headers());
        assert!(Command::Send.escapes_headers());
    }
}
