//! Subscription routing.
//!
//! The router owns every `SUBSCRIBE` the client issues. It keeps exactly one
//! conversation subscription set (the global topic, or the topic + queue pair
//! of one private room) plus one presence subscription, and classifies
//! inbound `MESSAGE` frames by their `subscription` header.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────────┐  switch(Global)   ┌──────────────────┐
//! │ NoSubscription │ ────────────────> │ GlobalSubscribed │
//! └────────────────┘                   └──────────────────┘
//!     ^    │ switch(Room(id))                │  ^
//!     │    ↓                                 ↓  │ switch(Global)
//!     │  ┌─────────────────────────┐  switch(Room(id))
//!     │  │ PrivateSubscribed(id)   │ <───────┘
//!     │  └─────────────────────────┘
//!     │        │
//!     └────────┘ switch(Unresolved), connection lost
//! ```
//!
//! While the connection is down the router only records the target; the
//! subscriptions are issued by [`SubscriptionRouter::resubscribe`] once the
//! session is established.

use parley_proto::{Command, ConversationId, Destination, Frame, header};

use crate::conversation::Conversation;

/// What the router should be subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Global topic.
    Global,
    /// Topic and queue of a resolved private room.
    Room(ConversationId),
    /// Private conversation whose room id is not known yet.
    Unresolved,
}

impl From<&Conversation> for Target {
    fn from(conversation: &Conversation) -> Self {
        match conversation {
            Conversation::Global => Self::Global,
            Conversation::Private { room: Some(room), .. } => Self::Room(room.clone()),
            Conversation::Private { room: None, .. } => Self::Unresolved,
        }
    }
}

/// Live conversation subscription set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    /// No conversation subscription held.
    NoSubscription,
    /// Subscribed to the global topic.
    GlobalSubscribed,
    /// Subscribed to the topic and queue of this room.
    PrivateSubscribed(ConversationId),
}

/// Where an inbound `MESSAGE` belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Presence feed.
    Presence,
    /// Active conversation.
    Conversation,
}

/// One broker subscription: a `sub-N` id bound to a single destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: String,
    destination: Destination,
}

impl SubscriptionHandle {
    /// Subscription id sent in `SUBSCRIBE` and echoed in `MESSAGE`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Destination the handle is bound to.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    fn subscribe_frame(&self) -> Frame {
        Frame::new(Command::Subscribe)
            .with_header(header::ID, self.id.clone())
            .with_header(header::DESTINATION, self.destination.to_string())
            .with_header(header::ACK, "auto")
    }

    fn unsubscribe_frame(&self) -> Frame {
        Frame::new(Command::Unsubscribe).with_header(header::ID, self.id.clone())
    }
}

/// Owner of all subscriptions of the session.
#[derive(Debug, Clone)]
pub struct SubscriptionRouter {
    target: Target,
    state: RouterState,
    conversation: Vec<SubscriptionHandle>,
    presence: Option<SubscriptionHandle>,
    /// Session established; frames returned by the router can be sent.
    live: bool,
    next_id: u64,
}

impl Default for SubscriptionRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRouter {
    /// Router targeting the global room, not yet live.
    pub fn new() -> Self {
        Self {
            target: Target::Global,
            state: RouterState::NoSubscription,
            conversation: Vec::new(),
            presence: None,
            live: false,
            next_id: 0,
        }
    }

    /// Current conversation subscription state.
    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// Remembered target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Whether the router has subscribed on the current session.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Handles of the conversation subscription set.
    pub fn conversation_handles(&self) -> &[SubscriptionHandle] {
        &self.conversation
    }

    /// Presence handle, if subscribed.
    pub fn presence_handle(&self) -> Option<&SubscriptionHandle> {
        self.presence.as_ref()
    }

    /// Every live destination, conversation set first.
    pub fn destinations(&self) -> Vec<Destination> {
        self.conversation
            .iter()
            .chain(self.presence.as_ref())
            .map(|handle| handle.destination.clone())
            .collect()
    }

    /// Switch the conversation subscription set to `target`.
    ///
    /// Returns the `UNSUBSCRIBE`/`SUBSCRIBE` frames to send. Tears down the
    /// previous conversation set first, then subscribes to the new one and
    /// makes sure presence is subscribed. Returns nothing while the
    /// connection is down.
    pub fn switch_context(&mut self, target: Target) -> Vec<Frame> {
        tracing::debug!(?target, live = self.live, "switch context");
        self.target = target;

        if !self.live {
            return Vec::new();
        }

        let mut frames: Vec<Frame> =
            self.conversation.drain(..).map(|handle| handle.unsubscribe_frame()).collect();
        self.state = RouterState::NoSubscription;

        frames.extend(self.subscribe_target());
        frames.extend(self.ensure_presence());
        frames
    }

    /// Session established: issue subscriptions for the remembered target and
    /// presence.
    pub fn resubscribe(&mut self) -> Vec<Frame> {
        // Handles from a previous session died with it.
        self.conversation.clear();
        self.presence = None;
        self.state = RouterState::NoSubscription;
        self.live = true;

        let mut frames = self.subscribe_target();
        frames.extend(self.ensure_presence());
        frames
    }

    /// Session lost: the broker dropped every subscription. The target is
    /// kept for [`SubscriptionRouter::resubscribe`].
    pub fn connection_lost(&mut self) {
        self.conversation.clear();
        self.presence = None;
        self.state = RouterState::NoSubscription;
        self.live = false;
    }

    /// Classify an inbound `MESSAGE` by its subscription id.
    ///
    /// Returns `None` for ids that are no longer held (stale deliveries after
    /// a switch).
    pub fn route(&self, subscription_id: &str) -> Option<Route> {
        if self.presence.as_ref().is_some_and(|h| h.id == subscription_id) {
            return Some(Route::Presence);
        }
        if self.conversation.iter().any(|h| h.id == subscription_id) {
            return Some(Route::Conversation);
        }
        None
    }

    fn subscribe_target(&mut self) -> Vec<Frame> {
        let (destinations, state) = match &self.target {
            Target::Global => (vec![Destination::PublicTopic], RouterState::GlobalSubscribed),
            Target::Room(room) => (
                vec![
                    Destination::ConversationTopic(room.clone()),
                    Destination::ConversationQueue(room.clone()),
                ],
                RouterState::PrivateSubscribed(room.clone()),
            ),
            Target::Unresolved => return Vec::new(),
        };

        let mut frames = Vec::with_capacity(destinations.len());
        for destination in destinations {
            let handle = self.allocate(destination);
            frames.push(handle.subscribe_frame());
            self.conversation.push(handle);
        }
        self.state = state;
        frames
    }

    fn ensure_presence(&mut self) -> Option<Frame> {
        if self.presence.is_some() {
            return None;
        }
        let handle = self.allocate(Destination::PresenceTopic);
        let frame = handle.subscribe_frame();
        self.presence = Some(handle);
        Some(frame)
    }

    fn allocate(&mut self, destination: Destination) -> SubscriptionHandle {
        let id = format!("sub-{}", self.next_id);
        self.next_id += 1;
        SubscriptionHandle { id, destination }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn live_router() -> SubscriptionRouter {
        let mut router = SubscriptionRouter::new();
        router.resubscribe();
        router
    }

    fn commands(frames: &[Frame]) -> Vec<(Command, String)> {
        frames
            .iter()
            .map(|f| {
                let dest = f.header(header::DESTINATION).unwrap_or("").to_string();
                (f.command, dest)
            })
            .collect()
    }

    #[test]
    fn resubscribe_starts_with_global_and_presence() {
        let mut router = SubscriptionRouter::new();
        let frames = router.resubscribe();

        assert_eq!(commands(&frames), vec![
            (Command::Subscribe, "/topic/public".to_string()),
            (Command::Subscribe, "/topic/presence".to_string()),
        ]);
        assert_eq!(router.state(), &RouterState::GlobalSubscribed);
    }

    #[test]
    fn private_room_subscribes_topic_and_queue() {
        let mut router = live_router();
        let frames = router.switch_context(Target::Room("12".into()));

        assert_eq!(commands(&frames), vec![
            (Command::Unsubscribe, String::new()),
            (Command::Subscribe, "/topic/conversation.12".to_string()),
            (Command::Subscribe, "/queue/conversation.12".to_string()),
        ]);
        assert_eq!(router.state(), &RouterState::PrivateSubscribed("12".into()));
        assert_eq!(router.conversation_handles().len(), 2);
    }

    #[test]
    fn unresolved_room_holds_no_conversation_subscription() {
        let mut router = live_router();
        let frames = router.switch_context(Target::Unresolved);

        assert_eq!(commands(&frames), vec![(Command::Unsubscribe, String::new())]);
        assert_eq!(router.state(), &RouterState::NoSubscription);
        assert_eq!(router.destinations(), vec![Destination::PresenceTopic]);
    }

    #[test]
    fn offline_switch_only_records_target() {
        let mut router = SubscriptionRouter::new();
        assert!(router.switch_context(Target::Room("3".into())).is_empty());

        let frames = router.resubscribe();
        assert_eq!(frames.len(), 3);
        assert_eq!(router.state(), &RouterState::PrivateSubscribed("3".into()));
    }

    #[test]
    fn stale_subscription_is_not_routed() {
        let mut router = live_router();
        let global_id = router.conversation_handles()[0].id().to_string();
        let presence_id = router.presence_handle().unwrap().id().to_string();

        router.switch_context(Target::Room("9".into()));

        assert_eq!(router.route(&global_id), None);
        assert_eq!(router.route(&presence_id), Some(Route::Presence));
        let queue_id = router.conversation_handles()[1].id().to_string();
        assert_eq!(router.route(&queue_id), Some(Route::Conversation));
    }

    #[test]
    fn connection_lost_keeps_target() {
        let mut router = live_router();
        router.switch_context(Target::Room("4".into()));
        router.connection_lost();

        assert!(router.destinations().is_empty());
        assert_eq!(router.target(), &Target::Room("4".into()));

        router.resubscribe();
        assert_eq!(router.destinations(), vec![
            Destination::ConversationTopic("4".into()),
            Destination::ConversationQueue("4".into()),
            Destination::PresenceTopic,
        ]);
    }

    fn target_strategy() -> impl Strategy<Value = Target> {
        prop_oneof![
            Just(Target::Global),
            Just(Target::Unresolved),
            (0u64..4).prop_map(|id| Target::Room(id.into())),
        ]
    }

    proptest! {
        #[test]
        fn at_most_one_conversation_set(targets in prop::collection::vec(target_strategy(), 1..32)) {
            let mut router = live_router();
            let mut subscribed = std::collections::HashSet::new();
            for handle in router.conversation_handles().iter().chain(router.presence_handle()) {
                subscribed.insert(handle.id().to_string());
            }

            for target in targets {
                for frame in router.switch_context(target.clone()) {
                    let id = frame.header(header::ID).unwrap().to_string();
                    match frame.command {
                        Command::Subscribe => prop_assert!(subscribed.insert(id)),
                        Command::Unsubscribe => prop_assert!(subscribed.remove(&id)),
                        _ => prop_assert!(false, "unexpected {:?}", frame.command),
                    }
                }

                let expected = match &target {
                    Target::Global => 1,
                    Target::Room(_) => 2,
                    Target::Unresolved => 0,
                };
                prop_assert_eq!(router.conversation_handles().len(), expected);
                prop_assert_eq!(subscribed.len(), expected + 1);
                prop_assert!(router.presence_handle().is_some());
            }
        }

        #[test]
        fn switching_twice_yields_same_destinations(target in target_strategy()) {
            let mut router = live_router();
            router.switch_context(target.clone());
            let first = router.destinations();
            router.switch_context(target);
            prop_assert_eq!(router.destinations(), first);
        }
    }
}
