//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::collections::{BTreeSet, HashSet};

use parley_client::{Conversation, RouterState};
use parley_proto::Destination;

use super::{ClientSnapshot, Invariant, InvariantResult, SystemSnapshot, Violation};

fn violation(invariant: &'static str, client: &ClientSnapshot, message: String) -> Violation {
    Violation { invariant, user: client.id, message }
}

/// At most one conversation subscription set is live, and it is the one of
/// the active conversation.
///
/// Global means exactly `/topic/public`; a resolved private room means its
/// topic and queue; an unresolved room or a dead session means nothing.
pub struct SingleConversationSubscription;

impl Invariant for SingleConversationSubscription {
    fn name(&self) -> &'static str {
        "single_conversation_subscription"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let expected: Vec<Destination> = if !client.router_live {
                Vec::new()
            } else {
                match &client.active {
                    Conversation::Global => vec![Destination::PublicTopic],
                    Conversation::Private { room: Some(room), .. } => vec![
                        Destination::ConversationTopic(room.clone()),
                        Destination::ConversationQueue(room.clone()),
                    ],
                    Conversation::Private { room: None, .. } => Vec::new(),
                }
            };

            if client.conversation_subscriptions != expected {
                return Err(violation(
                    self.name(),
                    client,
                    format!(
                        "active {:?} expects {expected:?}, subscribed to {:?}",
                        client.active, client.conversation_subscriptions
                    ),
                ));
            }

            let state_matches = match (&client.router_state, expected.first()) {
                (RouterState::NoSubscription, None)
                | (RouterState::GlobalSubscribed, Some(Destination::PublicTopic)) => true,
                (RouterState::PrivateSubscribed(id), Some(Destination::ConversationTopic(room))) => {
                    id == room
                },
                _ => false,
            };
            if !state_matches {
                return Err(violation(
                    self.name(),
                    client,
                    format!("router state {:?} disagrees with handles", client.router_state),
                ));
            }
        }
        Ok(())
    }
}

/// The store only holds messages of the active conversation.
///
/// Entries without a conversation id (global traffic, local error notices)
/// are allowed anywhere except that a private room never shows global
/// chatter and the global room never shows room traffic.
pub struct StoreMatchesActiveConversation;

impl Invariant for StoreMatchesActiveConversation {
    fn name(&self) -> &'static str {
        "store_matches_active_conversation"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let room = client.active.room();
            for message in &client.messages {
                let belongs = match (&client.active, &message.conversation_id) {
                    (_, None) => true,
                    (Conversation::Global, Some(_)) => false,
                    (Conversation::Private { .. }, Some(id)) => room == Some(id),
                };
                if !belongs {
                    return Err(violation(
                        self.name(),
                        client,
                        format!(
                            "message {:?} from conversation {:?} shown in {}",
                            message.server_id,
                            message.conversation_id,
                            client.active.title()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// No server id appears twice in a store.
pub struct UniqueServerIds;

impl Invariant for UniqueServerIds {
    fn name(&self) -> &'static str {
        "unique_server_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for id in client.messages.iter().filter_map(|m| m.server_id) {
                if !seen.insert(id) {
                    return Err(violation(self.name(), client, format!("message {id} stored twice")));
                }
            }
        }
        Ok(())
    }
}

/// A live session always carries the presence subscription, and a dead one
/// carries nothing.
pub struct PresenceSubscribedWhenLive;

impl Invariant for PresenceSubscribedWhenLive {
    fn name(&self) -> &'static str {
        "presence_subscribed_when_live"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            if client.router_live != client.connected {
                return Err(violation(
                    self.name(),
                    client,
                    format!("router live={} but connected={}", client.router_live, client.connected),
                ));
            }
            if client.presence_subscribed != client.router_live {
                return Err(violation(
                    self.name(),
                    client,
                    format!(
                        "presence subscribed={} while live={}",
                        client.presence_subscribed, client.router_live
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Once quiescent, the broker holds exactly the subscriptions the router
/// believes it holds: no leaked or missing subscription.
pub struct BrokerAgreesWithRouter;

impl Invariant for BrokerAgreesWithRouter {
    fn name(&self) -> &'static str {
        "broker_agrees_with_router"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let Some(broker) = &client.broker_subscriptions else {
                continue;
            };

            let mut ours: Vec<String> =
                client.conversation_subscriptions.iter().map(ToString::to_string).collect();
            if client.presence_subscribed {
                ours.push(Destination::PresenceTopic.to_string());
            }
            let ours: BTreeSet<String> = ours.into_iter().collect();
            let theirs: Vec<String> = broker.iter().map(ToString::to_string).collect();

            if theirs.len() != ours.len() || theirs.iter().any(|d| !ours.contains(d)) {
                return Err(violation(
                    self.name(),
                    client,
                    format!("router holds {ours:?}, broker holds {theirs:?}"),
                ));
            }
        }
        Ok(())
    }
}
