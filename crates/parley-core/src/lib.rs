//! Core
//!
//! Sans-IO session layer for Parley. Owns the single broker connection:
//! STOMP handshake, heart-beat negotiation, liveness detection and the
//! reconnect loop with capped exponential backoff.
//!
//! # Architecture
//!
//! Everything here follows the action pattern: methods take the current time
//! and return [`ConnectionAction`]s for a driver to execute. No method
//! performs I/O, which keeps the state machine deterministic under
//! simulation.
//!
//! # Components
//!
//! - [`Connection`]: the connection state machine
//! - [`ReconnectPolicy`]: backoff schedule for reconnect attempts
//! - [`Environment`]: time and randomness abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
pub mod env;
pub mod error;
pub mod reconnect;

pub use connection::{Connection, ConnectionAction, ConnectionConfig, ConnectionState};
pub use env::Environment;
pub use error::ConnectionError;
pub use reconnect::ReconnectPolicy;
