//! Header names, heart-beat negotiation values and header escaping.
//!
//! STOMP 1.2 escapes four octets inside header names and values of every
//! frame except `CONNECT` and `CONNECTED`:
//!
//! | Raw  | Escaped |
//! |------|---------|
//! | `\`  | `\\`    |
//! | LF   | `\n`    |
//! | CR   | `\r`    |
//! | `:`  | `\c`    |
//!
//! Any other escape sequence is a protocol error.

use std::{fmt, str::FromStr, time::Duration};

use crate::errors::{ProtocolError, Result};

/// Protocol version negotiated by the client.
pub const STOMP_VERSION: &str = "1.2";

/// `accept-version` header (CONNECT).
pub const ACCEPT_VERSION: &str = "accept-version";
/// `host` header (CONNECT).
pub const HOST: &str = "host";
/// `login` header (CONNECT).
pub const LOGIN: &str = "login";
/// `passcode` header (CONNECT).
pub const PASSCODE: &str = "passcode";
/// `heart-beat` header (CONNECT / CONNECTED).
pub const HEART_BEAT: &str = "heart-beat";
/// `version` header (CONNECTED).
pub const VERSION: &str = "version";
/// `session` header (CONNECTED).
pub const SESSION: &str = "session";
/// `destination` header (SEND / SUBSCRIBE / MESSAGE).
pub const DESTINATION: &str = "destination";
/// `id` header (SUBSCRIBE / UNSUBSCRIBE).
pub const ID: &str = "id";
/// `ack` header (SUBSCRIBE).
pub const ACK: &str = "ack";
/// `subscription` header (MESSAGE).
pub const SUBSCRIPTION: &str = "subscription";
/// `message-id` header (MESSAGE).
pub const MESSAGE_ID: &str = "message-id";
/// `content-type` header.
pub const CONTENT_TYPE: &str = "content-type";
/// `content-length` header.
pub const CONTENT_LENGTH: &str = "content-length";
/// `receipt` header (any client frame).
pub const RECEIPT: &str = "receipt";
/// `receipt-id` header (RECEIPT).
pub const RECEIPT_ID: &str = "receipt-id";
/// `message` header (ERROR).
pub const MESSAGE: &str = "message";

/// Heart-beat intervals as carried by the `heart-beat` header.
///
/// `outgoing` is how often the sender of the header promises to emit
/// heartbeats; `incoming` is how often it wants to receive them. Zero means
/// "cannot send" / "does not want" respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// Smallest interval at which the sender can emit heartbeats.
    pub outgoing: Duration,
    /// Desired interval between heartbeats from the peer.
    pub incoming: Duration,
}

impl HeartBeat {
    /// Symmetric heart-beat setting.
    #[must_use]
    pub const fn symmetric(interval: Duration) -> Self {
        Self { outgoing: interval, incoming: interval }
    }

    /// Negotiate effective intervals from the client's request and the
    /// broker's reply.
    ///
    /// Returns `(send_every, expect_every)` from the client's point of view.
    /// Each is `None` when either side disabled that direction.
    #[must_use]
    pub fn negotiate(client: Self, server: Self) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: Duration, theirs: Duration| {
            if ours.is_zero() || theirs.is_zero() { None } else { Some(ours.max(theirs)) }
        };
        (pick(client.outgoing, server.incoming), pick(client.incoming, server.outgoing))
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing.as_millis(), self.incoming.as_millis())
    }
}

impl FromStr for HeartBeat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProtocolError::InvalidHeartBeat(s.to_string());
        let (out, inc) = s.split_once(',').ok_or_else(invalid)?;
        let outgoing = out.trim().parse::<u64>().map_err(|_| invalid())?;
        let incoming = inc.trim().parse::<u64>().map_err(|_| invalid())?;
        Ok(Self {
            outgoing: Duration::from_millis(outgoing),
            incoming: Duration::from_millis(incoming),
        })
    }
}

/// Escape a header name or value.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`].
///
/// # Errors
///
/// - `ProtocolError::InvalidEscape` for an undefined or dangling escape
pub fn unescape(escaped: &str) -> Result<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(ProtocolError::InvalidEscape(escaped.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn escape_is_reversible(raw in ".*") {
            prop_assert_eq!(unescape(&escape(&raw)).unwrap(), raw);
        }

        #[test]
        fn escaped_text_has_no_separators(raw in ".*") {
            let escaped = escape(&raw);
            prop_assert!(!escaped.contains(':'));
            prop_assert!(!escaped.contains('\n'));
        }
    }

    #[test]
    fn undefined_escape_rejected() {
        assert!(matches!(unescape("a\\tb"), Err(ProtocolError::InvalidEscape(_))));
        assert!(matches!(unescape("dangling\\"), Err(ProtocolError::InvalidEscape(_))));
    }

    #[test]
    fn heart_beat_parse_and_display() {
        let hb: HeartBeat = "4000,4000".parse().unwrap();
        assert_eq!(hb, HeartBeat::symmetric(Duration::from_millis(4000)));
        assert_eq!(hb.to_string(), "4000,4000");
        assert!("4000".parse::<HeartBeat>().is_err());
        assert!("a,b".parse::<HeartBeat>().is_err());
    }

    #[test]
    fn negotiation_takes_slower_side_and_honours_zero() {
        let client = HeartBeat::symmetric(Duration::from_millis(4000));
        let server = HeartBeat {
            outgoing: Duration::from_millis(10_000),
            incoming: Duration::ZERO,
        };

        let (send, expect) = HeartBeat::negotiate(client, server);
        assert_eq!(send, None);
        assert_eq!(expect, Some(Duration::from_millis(10_000)));
    }
}
