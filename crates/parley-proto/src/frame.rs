//! STOMP frame and packet types.
//!
//! Layout on the wire:
//!
//! ```text
//! COMMAND LF
//! (name:value LF)*
//! LF
//! body NUL
//! ```
//!
//! A [`Packet`] is what travels inside one WebSocket message: either a
//! heartbeat (one or more bare EOLs) or a single [`Frame`]. Leading EOLs in
//! front of a frame are heartbeats the broker piggy-backed and are skipped.

use bytes::{BufMut, Bytes};

use crate::{
    Command,
    errors::{ProtocolError, Result},
    header,
};

/// A single STOMP frame.
///
/// # Invariants
///
/// - Header order is preserved. When a header repeats, the first occurrence
///   wins ([`Frame::header`]), as STOMP 1.2 requires.
/// - Frames built with [`Frame::with_body`] always carry a `content-length`
///   matching the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order, unescaped.
    headers: Vec<(String, String)>,
    /// Raw body bytes (JSON for Parley payloads).
    pub body: Bytes,
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: Bytes::new() }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body and set `content-length` accordingly.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self.headers.retain(|(name, _)| name != header::CONTENT_LENGTH);
        self.headers.push((header::CONTENT_LENGTH.to_string(), self.body.len().to_string()));
        self
    }

    /// First value of the named header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Value of a header the caller cannot proceed without.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MissingHeader` if absent
    pub fn require_header(&self, name: &'static str) -> Result<&str> {
        self.header(name).ok_or(ProtocolError::MissingHeader(name))
    }

    /// All headers in wire order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` if the body is binary
    pub fn body_str(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        let escape = self.command.escapes_headers();

        dst.put_slice(self.command.as_str().as_bytes());
        dst.put_u8(b'\n');
        for (name, value) in &self.headers {
            if escape {
                dst.put_slice(header::escape(name).as_bytes());
                dst.put_u8(b':');
                dst.put_slice(header::escape(value).as_bytes());
            } else {
                dst.put_slice(name.as_bytes());
                dst.put_u8(b':');
                dst.put_slice(value.as_bytes());
            }
            dst.put_u8(b'\n');
        }
        dst.put_u8(b'\n');
        dst.put_slice(&self.body);
        dst.put_u8(0);
    }

    /// Decode a frame that starts at the first byte of `bytes`.
    ///
    /// Trailing bytes after the NUL terminator (usually heartbeat EOLs) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Truncated` if the header block never ends or the
    ///   body is shorter than `content-length`
    /// - `ProtocolError::MissingNul` if the body is not NUL-terminated
    /// - `ProtocolError::UnknownCommand`, `MalformedHeader`, `InvalidEscape`,
    ///   `InvalidContentLength`, `InvalidUtf8` for malformed content
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (head, body_start) = split_head(bytes)?;
        let head = std::str::from_utf8(head).map_err(|_| ProtocolError::InvalidUtf8)?;

        let mut lines = head.lines();
        let command_line = lines.next().ok_or(ProtocolError::Truncated)?;
        let command: Command = command_line.parse()?;
        let escaped = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) =
                line.split_once(':').ok_or_else(|| ProtocolError::MalformedHeader(line.into()))?;
            if escaped {
                headers.push((header::unescape(name)?, header::unescape(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let rest = bytes.get(body_start..).ok_or(ProtocolError::Truncated)?;
        let content_length = headers
            .iter()
            .find(|(n, _)| n == header::CONTENT_LENGTH)
            .map(|(_, v)| {
                v.trim().parse::<usize>().map_err(|_| ProtocolError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let body = match content_length {
            Some(len) => {
                let body = rest.get(..len).ok_or(ProtocolError::Truncated)?;
                match rest.get(len) {
                    Some(0) => body,
                    Some(_) => return Err(ProtocolError::MissingNul),
                    None => return Err(ProtocolError::Truncated),
                }
            },
            None => {
                let nul = rest.iter().position(|b| *b == 0).ok_or(ProtocolError::MissingNul)?;
                rest.get(..nul).ok_or(ProtocolError::Truncated)?
            },
        };

        Ok(Self { command, headers, body: Bytes::copy_from_slice(body) })
    }
}

/// Split the header block from the body.
///
/// Returns the header block (command line plus header lines) and the offset
/// at which the body begins.
fn split_head(buf: &[u8]) -> Result<(&[u8], usize)> {
    let mut line_start = 0;
    for (i, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let line = buf.get(line_start..i).ok_or(ProtocolError::Truncated)?;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && line_start > 0 {
            let head = buf.get(..line_start).ok_or(ProtocolError::Truncated)?;
            return Ok((head, i + 1));
        }
        line_start = i + 1;
    }
    Err(ProtocolError::Truncated)
}

/// Unit of transport: one WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Keep-alive EOL.
    Heartbeat,
    /// A full frame.
    Frame(Frame),
}

impl Packet {
    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        match self {
            Self::Heartbeat => dst.put_u8(b'\n'),
            Self::Frame(frame) => frame.encode(dst),
        }
    }

    /// Encode as the text of a WebSocket message.
    ///
    /// Frames with binary bodies are encoded lossily; Parley bodies are
    /// always JSON.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Decode one WebSocket message.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Empty` for a zero-length message
    /// - Any [`Frame::decode`] error
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ProtocolError::Empty);
        }

        match bytes.iter().position(|b| *b != b'\n' && *b != b'\r') {
            None => Ok(Self::Heartbeat),
            Some(start) => {
                let frame_bytes = bytes.get(start..).ok_or(ProtocolError::Truncated)?;
                Frame::decode(frame_bytes).map(Self::Frame)
            },
        }
    }
}

impl From<Frame> for Packet {
    fn from(frame: Frame) -> Self {
        Self::Frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn header_text() -> impl Strategy<Value = String> {
        "[a-z:\\\\\r\n ]{0,12}"
    }

    fn arb_frame() -> impl Strategy<Value = Frame> {
        (
            prop_oneof![
                Just(Command::Send),
                Just(Command::Message),
                Just(Command::Subscribe),
                Just(Command::Error),
            ],
            prop::collection::vec(("[a-z-]{1,10}", header_text()), 0..5),
            prop::collection::vec(any::<u8>(), 0..64),
        )
            .prop_map(|(command, headers, body)| {
                let frame = headers
                    .into_iter()
                    .filter(|(name, _)| name != header::CONTENT_LENGTH)
                    .fold(Frame::new(command), |f, (n, v)| f.with_header(n, v));
                frame.with_body(body)
            })
    }

    proptest! {
        #[test]
        fn frame_round_trip(frame in arb_frame()) {
            let mut wire = Vec::new();
            frame.encode(&mut wire);

            let parsed = Frame::decode(&wire).expect("should decode");
            prop_assert_eq!(frame, parsed);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = Packet::decode(&bytes);
        }
    }

    #[test]
    fn encode_send_frame() {
        let frame = Frame::new(Command::Send)
            .with_header(header::DESTINATION, "/app/sendMessage")
            .with_body(&b"{}"[..]);

        let text = Packet::Frame(frame).to_text();
        insta::assert_snapshot!(text.replace('\0', "^@"), @r"
        SEND
        destination:/app/sendMessage
        content-length:2

        {}^@
        ");
    }

    #[test]
    fn body_without_content_length_ends_at_nul() {
        let frame = Frame::decode(b"MESSAGE\nsubscription:sub-0\n\nhello\0\n\n").unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header(header::SUBSCRIPTION), Some("sub-0"));
        assert_eq!(&frame.body[..], b"hello");
    }

    #[test]
    fn content_length_allows_embedded_nul() {
        let frame = Frame::decode(b"MESSAGE\ncontent-length:3\n\na\0b\0").unwrap();
        assert_eq!(&frame.body[..], b"a\0b");
    }

    #[test]
    fn crlf_line_endings_accepted() {
        let frame = Frame::decode(b"CONNECTED\r\nversion:1.2\r\n\r\n\0").unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.header(header::VERSION), Some("1.2"));
    }

    #[test]
    fn first_repeated_header_wins() {
        let frame = Frame::decode(b"MESSAGE\nfoo:first\nfoo:second\n\n\0").unwrap();
        assert_eq!(frame.header("foo"), Some("first"));
    }

    #[test]
    fn connected_headers_are_not_unescaped() {
        let frame = Frame::decode(b"CONNECTED\nserver:a\\cb\n\n\0").unwrap();
        assert_eq!(frame.header("server"), Some("a\\cb"));
    }

    #[test]
    fn reject_truncated_body() {
        let result = Frame::decode(b"MESSAGE\ncontent-length:10\n\nabc\0");
        assert_eq!(result, Err(ProtocolError::Truncated));
    }

    #[test]
    fn reject_missing_nul() {
        assert_eq!(Frame::decode(b"MESSAGE\n\nabc"), Err(ProtocolError::MissingNul));
        assert_eq!(
            Frame::decode(b"MESSAGE\ncontent-length:1\n\nab"),
            Err(ProtocolError::MissingNul)
        );
    }

    #[test]
    fn reject_unterminated_header_block() {
        assert_eq!(Frame::decode(b"MESSAGE\nfoo:bar"), Err(ProtocolError::Truncated));
    }

    #[test]
    fn reject_header_without_separator() {
        assert!(matches!(
            Frame::decode(b"MESSAGE\nnocolon\n\n\0"),
            Err(ProtocolError::MalformedHeader(_))
        ));
    }

    #[test]
    fn bare_eols_are_heartbeats() {
        assert_eq!(Packet::decode(b"\n"), Ok(Packet::Heartbeat));
        assert_eq!(Packet::decode(b"\r\n\n"), Ok(Packet::Heartbeat));
        assert_eq!(Packet::decode(b""), Err(ProtocolError::Empty));
    }

    #[test]
    fn leading_heartbeat_before_frame_is_skipped() {
        let packet = Packet::decode(b"\nRECEIPT\nreceipt-id:7\n\n\0").unwrap();
        let Packet::Frame(frame) = packet else { panic!("expected frame") };
        assert_eq!(frame.header(header::RECEIPT_ID), Some("7"));
    }
}
