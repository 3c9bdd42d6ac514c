//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs a [`crate::Driver`]
//! reports to the [`crate::Runtime`].
//!
//! Events originate from two distinct sources:
//! - User interactions ([`UserIntent`]) and window focus changes.
//! - I/O completions: transport lifecycle, inbound packets, REST results.

use parley_client::{FetchResult, HistoryError};
use parley_proto::{Packet, payloads::UserSummary};

/// Something the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Switch to the global room.
    OpenGlobal,
    /// Switch to a private room. `target` is a user id or a username from
    /// the last search.
    Open {
        /// User id or username.
        target: String,
    },
    /// Look up users by name.
    Search {
        /// Name fragment.
        query: String,
    },
    /// Show the chat widget.
    ShowWidget,
    /// Hide the chat widget.
    HideWidget,
    /// Window focus changed.
    Focus(bool),
    /// Send text to the active conversation.
    Send(String),
    /// Show command help.
    Help,
    /// Leave the application.
    Quit,
}

/// Events processed by the runtime.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// User input.
    User(UserIntent),

    /// Transport requested with `open_transport` is open.
    TransportOpened,

    /// Transport could not be opened.
    TransportFailed {
        /// Failure description.
        reason: String,
    },

    /// Transport closed by the peer or the network.
    TransportClosed {
        /// Close description.
        reason: String,
    },

    /// Packet received from the broker.
    Packet(Packet),

    /// REST request completed.
    Fetched {
        /// Token passed to `fetch`.
        token: u64,
        /// Request outcome.
        result: Result<FetchResult, HistoryError>,
    },

    /// User search completed.
    UsersFound(Result<Vec<UserSummary>, HistoryError>),
}
