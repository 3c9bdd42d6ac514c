//! Client
//!
//! Action-based chat client state machine for Parley. Manages the broker
//! connection, the active conversation, subscriptions, the message log,
//! presence and read receipts.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`parley_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute. REST calls are actions too: the caller runs them
//! against a [`HistoryService`] and feeds the result back.
//!
//! # Components
//!
//! - [`Client`]: Conversation orchestrator, the top-level state machine
//! - [`SubscriptionRouter`]: Owns every subscription, routes inbound messages
//! - [`MessageStore`]: Message log with echo and duplicate suppression
//! - [`PresenceTracker`]: Online-user set
//! - [`ReadReceiptCoordinator`]: Decides when to mark a room read
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::ConnectedClient`]: Client with WebSocket transport
//! - [`transport::connect`]: Connect to a broker
//!
//! With the `rest` feature enabled, [`rest::RestClient`] implements
//! [`HistoryService`] over HTTP.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod conversation;
mod error;
mod event;
mod history;
mod presence;
mod receipts;
mod router;
mod store;

#[cfg(feature = "rest")]
pub mod rest;
#[cfg(feature = "transport")]
pub mod transport;

pub use client::Client;
pub use conversation::{Conversation, Friend, Identity};
pub use error::{ClientError, SendBlocked};
pub use event::{ClientAction, ClientEvent};
pub use history::{FetchRequest, FetchResult, HistoryError, HistoryService};
pub use parley_core::{ConnectionConfig, ConnectionState, Environment, ReconnectPolicy};
pub use presence::PresenceTracker;
pub use receipts::{ReadReceiptCoordinator, ReceiptContext, ReceiptTrigger};
pub use router::{Route, RouterState, SubscriptionHandle, SubscriptionRouter, Target};
pub use store::{Ingested, MessageStore, SYSTEM_SENDER};
