//! Wire protocol for Parley.
//!
//! Parley speaks STOMP 1.2 over a single WebSocket. Every WebSocket text
//! message carries exactly one [`Packet`]: either a heartbeat (a bare EOL) or
//! a [`Frame`]. Frame bodies are JSON documents described in [`payloads`].
//!
//! # Components
//!
//! - [`Frame`] / [`Packet`]: text framing with header escaping
//! - [`Command`]: the STOMP commands the client and broker exchange
//! - [`Destination`]: typed topic, queue and application destinations
//! - [`payloads`]: chat messages, presence updates, read receipts, REST DTOs

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod command;
mod destination;
pub mod errors;
mod frame;
pub mod header;
mod ids;
pub mod payloads;

pub use command::Command;
pub use destination::Destination;
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, Packet};
pub use header::HeartBeat;
pub use ids::{ConversationId, UserId};
pub use payloads::Payload;
