//! Deterministic simulation harness for the Parley chat client.
//!
//! Runs the production [`parley_app::Runtime`] against an in-memory STOMP
//! broker with a virtual clock and seeded randomness, so every run of a
//! scenario replays identically.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the client
//! invariants; [`Scenario`] checks them after every processed event.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_broker;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_history;

pub use invariants::{
    BrokerAgreesWithRouter, ClientSnapshot, Invariant, InvariantRegistry, InvariantResult,
    PresenceSubscribedWhenLive, SingleConversationSubscription, StoreMatchesActiveConversation,
    SystemSnapshot, UniqueServerIds, Violation,
};
pub use scenario::{Scenario, SimClient};
pub use sim_broker::{Room, SessionId, SharedBroker, SimBroker};
pub use sim_driver::{PendingFetch, SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_history::SimHistory;
