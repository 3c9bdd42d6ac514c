//! JSON-encoded frame bodies.
//!
//! Frames carry routing information in headers and application data in a
//! JSON body. Unlike the header block, bodies are only parsed by the client
//! component that owns the destination, so a malformed body costs exactly
//! one message and never the subscription.

pub mod chat;
pub mod presence;
pub mod receipt;
pub mod rest;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Command, Destination, Frame, errors::Result, header};

/// MIME type of every Parley body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A JSON body that can be published to, or received from, a destination.
pub trait Payload: Serialize + DeserializeOwned {
    /// Build a `SEND` frame publishing this payload.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if serialization fails
    fn to_send_frame(&self, destination: &Destination) -> Result<Frame> {
        let body = serde_json::to_vec(self)?;
        Ok(Frame::new(Command::Send)
            .with_header(header::DESTINATION, destination.to_string())
            .with_header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .with_body(body))
    }

    /// Parse this payload from a frame body.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Json` if the body is not the expected document
    fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(serde_json::from_slice(&frame.body)?)
    }
}

pub use chat::{ChatMessage, MessageKind, MessageStatus};
pub use presence::{PresenceStatus, PresenceUpdate};
pub use receipt::MarkRead;
pub use rest::{CreatePrivateRoom, PrivateRoom, UserSummary};
