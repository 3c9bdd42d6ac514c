//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::BTreeSet;

use parley_client::{Client, Conversation, Environment, RouterState};
use parley_proto::{Destination, UserId, payloads::ChatMessage};

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Signed-in user.
    pub id: UserId,
    /// Active conversation.
    pub active: Conversation,
    /// Whether the broker session is live.
    pub connected: bool,
    /// Router state machine state.
    pub router_state: RouterState,
    /// Whether the router subscribed on the current session.
    pub router_live: bool,
    /// Destinations of the conversation subscription set.
    pub conversation_subscriptions: Vec<Destination>,
    /// Whether presence is subscribed.
    pub presence_subscribed: bool,
    /// Messages of the active conversation.
    pub messages: Vec<ChatMessage>,
    /// Online users.
    pub online: BTreeSet<UserId>,
    /// What the broker holds for this client's session. Only filled when
    /// both sides are quiescent.
    pub broker_subscriptions: Option<Vec<Destination>>,
}

impl ClientSnapshot {
    /// Capture `client`.
    pub fn from_client<E: Environment>(client: &Client<E>) -> Self {
        let router = client.router();
        Self {
            id: client.identity().user_id,
            active: client.active().clone(),
            connected: client.is_connected(),
            router_state: router.state().clone(),
            router_live: router.is_live(),
            conversation_subscriptions: router
                .conversation_handles()
                .iter()
                .map(|h| h.destination().clone())
                .collect(),
            presence_subscribed: router.presence_handle().is_some(),
            messages: client.messages().to_vec(),
            online: client.online_users(),
            broker_subscriptions: None,
        }
    }

    /// Attach the broker's view of the session.
    #[must_use]
    pub fn with_broker_subscriptions(mut self, destinations: Vec<Destination>) -> Self {
        self.broker_subscriptions = Some(destinations);
        self
    }
}
