//! Client events and actions.

use parley_proto::Packet;

use crate::{
    conversation::Friend,
    history::{FetchRequest, FetchResult, HistoryError},
};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Reporting transport lifecycle and inbound packets
/// - Driving time forward via ticks
/// - Forwarding user intents (open a conversation, send, focus changes)
/// - Returning REST results with the token they were requested with
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual clock) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Start connecting.
    Start {
        /// Current time.
        now: I,
    },

    /// Transport requested by `OpenTransport` is open.
    TransportOpened {
        /// Current time.
        now: I,
    },

    /// Transport could not be opened.
    TransportFailed {
        /// Current time.
        now: I,
        /// Failure description.
        reason: String,
    },

    /// Transport closed by the peer or the network.
    TransportClosed {
        /// Current time.
        now: I,
        /// Close description.
        reason: String,
    },

    /// Packet received from the broker.
    PacketReceived {
        /// Decoded packet.
        packet: Packet,
        /// Current time.
        now: I,
    },

    /// Time tick for heart-beats, timeouts and reconnects.
    ///
    /// The caller should send ticks periodically (100 ms is plenty).
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Switch to the global room.
    OpenGlobal,

    /// Switch to the private room with `friend`.
    OpenWith {
        /// The other participant.
        friend: Friend,
    },

    /// Show the chat widget.
    OpenWidget,

    /// Hide the chat widget.
    CloseWidget,

    /// Send a text message to the active conversation.
    Send {
        /// Message text.
        content: String,
    },

    /// Window focus changed.
    FocusChanged {
        /// Whether the window now has focus.
        focused: bool,
    },

    /// Outcome of a `Fetch` action.
    Fetched {
        /// Token the request was issued with.
        token: u64,
        /// Request outcome.
        result: Result<FetchResult, HistoryError>,
    },

    /// Tear down the session for good.
    Shutdown,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open the WebSocket to the broker.
    OpenTransport,

    /// Close the WebSocket.
    CloseTransport {
        /// Reason for closing.
        reason: String,
    },

    /// Send a packet to the broker.
    Send(Packet),

    /// Run a REST request and feed the result back as
    /// [`ClientEvent::Fetched`] with the same token.
    Fetch {
        /// Switch token the result must carry.
        token: u64,
        /// What to fetch.
        request: FetchRequest,
    },
}
