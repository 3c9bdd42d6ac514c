//! Client state machine.
//!
//! The `Client` is the conversation orchestrator. It owns the connection,
//! the subscription router, the message store, the presence tracker and the
//! read receipt coordinator, and sequences them for every event.

use std::collections::BTreeSet;

use parley_core::{Connection, ConnectionAction, ConnectionConfig, ConnectionState, Environment};
use parley_proto::{
    Command, Destination, Frame, Packet, Payload, UserId, header,
    payloads::{ChatMessage, MessageKind, PresenceUpdate},
};

use crate::{
    conversation::{Conversation, Friend, Identity},
    error::{ClientError, SendBlocked},
    event::{ClientAction, ClientEvent},
    history::{FetchRequest, FetchResult, HistoryError},
    presence::PresenceTracker,
    receipts::{ReadReceiptCoordinator, ReceiptContext, ReceiptTrigger},
    router::{Route, SubscriptionRouter, Target},
    store::{Ingested, MessageStore},
};

/// Chat client for one signed-in user.
///
/// Pure state machine: [`Client::handle`] takes one [`ClientEvent`] and
/// returns the [`ClientAction`]s the driver must execute.
pub struct Client<E: Environment> {
    /// Environment for idempotency keys and send timestamps.
    env: E,

    /// Signed-in user.
    identity: Identity,

    /// Broker connection lifecycle.
    connection: Connection<E>,

    /// Subscription owner.
    router: SubscriptionRouter,

    /// Messages of the active conversation.
    store: MessageStore,

    /// Online users.
    presence: PresenceTracker,

    /// Read receipt policy.
    receipts: ReadReceiptCoordinator,

    /// Exactly one active conversation.
    active: Conversation,

    /// Chat widget visibility.
    widget_open: bool,

    /// Window focus.
    focused: bool,

    /// Incremented on every switch. Fetch results carrying an older token
    /// are discarded.
    token: u64,

    /// Set when loading the active conversation failed. Disables sending
    /// until the conversation is reopened.
    history_error: bool,

    /// A receipt came due while no session was up. Re-evaluated once the
    /// session is established; cleared on switch.
    receipt_deferred: bool,
}

impl<E: Environment> Client<E> {
    /// Create a client for `identity`. Nothing happens until
    /// [`ClientEvent::Start`].
    pub fn new(env: E, identity: Identity, config: ConnectionConfig) -> Self {
        let connection = Connection::new(env.clone(), config);
        Self {
            env,
            identity,
            connection,
            router: SubscriptionRouter::new(),
            store: MessageStore::new(),
            presence: PresenceTracker::new(),
            receipts: ReadReceiptCoordinator::new(),
            active: Conversation::Global,
            widget_open: false,
            focused: true,
            token: 0,
            history_error: false,
            receipt_deferred: false,
        }
    }

    /// Signed-in user.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Active conversation.
    pub fn active(&self) -> &Conversation {
        &self.active
    }

    /// Messages of the active conversation.
    pub fn messages(&self) -> &[ChatMessage] {
        self.store.messages()
    }

    /// Copy of the online-user set.
    pub fn online_users(&self) -> BTreeSet<UserId> {
        self.presence.snapshot()
    }

    /// Whether `user_id` is online.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.presence.is_online(user_id)
    }

    /// Whether a broker session is live.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection state machine, for diagnostics.
    pub fn connection(&self) -> &Connection<E> {
        &self.connection
    }

    /// Subscription router, for diagnostics.
    pub fn router(&self) -> &SubscriptionRouter {
        &self.router
    }

    /// Read receipt coordinator, for diagnostics.
    pub fn receipts(&self) -> &ReadReceiptCoordinator {
        &self.receipts
    }

    /// Whether the chat widget is open.
    pub fn widget_open(&self) -> bool {
        self.widget_open
    }

    /// Whether loading the active conversation failed.
    pub fn history_error(&self) -> bool {
        self.history_error
    }

    /// Current switch token.
    pub fn switch_token(&self) -> u64 {
        self.token
    }

    /// Why sending is disabled, if it is.
    pub fn send_blocked(&self) -> Option<SendBlocked> {
        if !self.connection.is_connected() {
            Some(SendBlocked::Disconnected)
        } else if self.history_error {
            Some(SendBlocked::HistoryFailed)
        } else if !self.active.is_resolved() {
            Some(SendBlocked::RoomPending)
        } else {
            None
        }
    }

    /// Whether [`ClientEvent::Send`] would be accepted.
    pub fn can_send(&self) -> bool {
        self.send_blocked().is_none()
    }

    /// Process an event and return resulting actions.
    pub fn handle(
        &mut self,
        event: ClientEvent<E::Instant>,
    ) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Start { now } => {
                let actions = self.connection.connect(now)?;
                Ok(self.apply_connection(actions))
            },
            ClientEvent::TransportOpened { now } => {
                let actions = self.connection.transport_opened(now)?;
                Ok(self.apply_connection(actions))
            },
            ClientEvent::TransportFailed { now, reason } => {
                let actions = self.connection.transport_failed(now, &reason);
                Ok(self.apply_connection(actions))
            },
            ClientEvent::TransportClosed { now, reason } => {
                let actions = self.connection.transport_closed(now, &reason);
                Ok(self.apply_connection(actions))
            },
            ClientEvent::PacketReceived { packet, now } => Ok(self.handle_packet(&packet, now)),
            ClientEvent::Tick { now } => {
                let actions = self.connection.tick(now);
                Ok(self.apply_connection(actions))
            },
            ClientEvent::OpenGlobal => Ok(self.open_global()),
            ClientEvent::OpenWith { friend } => Ok(self.open_with(friend)),
            ClientEvent::OpenWidget => {
                self.widget_open = true;
                Ok(Vec::new())
            },
            ClientEvent::CloseWidget => {
                self.widget_open = false;
                Ok(Vec::new())
            },
            ClientEvent::Send { content } => self.send(&content),
            ClientEvent::FocusChanged { focused } => Ok(self.focus_changed(focused)),
            ClientEvent::Fetched { token, result } => Ok(self.fetched(token, result)),
            ClientEvent::Shutdown => {
                let actions = self.connection.shutdown();
                self.router.connection_lost();
                Ok(self.apply_connection(actions))
            },
        }
    }

    fn open_global(&mut self) -> Vec<ClientAction> {
        self.switch_to(Conversation::Global);
        let frames = self.router.switch_context(Target::Global);
        let mut actions = self.send_frames(frames);
        actions.push(ClientAction::Fetch { token: self.token, request: FetchRequest::GlobalHistory });
        actions
    }

    fn open_with(&mut self, friend: Friend) -> Vec<ClientAction> {
        let target = friend.id;
        self.switch_to(Conversation::Private { counterpart: friend, room: None });
        let frames = self.router.switch_context(Target::Unresolved);
        let mut actions = self.send_frames(frames);
        actions.push(ClientAction::Fetch {
            token: self.token,
            request: FetchRequest::CreatePrivateRoom { target },
        });
        actions
    }

    fn switch_to(&mut self, conversation: Conversation) {
        self.token += 1;
        tracing::info!(conversation = %conversation.title(), token = self.token, "switching conversation");

        self.active = conversation;
        self.store.reset();
        self.history_error = false;
        self.receipt_deferred = false;
        self.widget_open = true;
    }

    fn send(&mut self, content: &str) -> Result<Vec<ClientAction>, ClientError> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if let Some(blocked) = self.send_blocked() {
            return Err(ClientError::SendUnavailable(blocked));
        }

        let client_id = format!("{:016x}", self.env.random_u64());
        let message = ChatMessage::text(&self.identity.username, self.identity.user_id, content)
            .with_client_id(client_id);

        let (message, destination) = match self.active.room() {
            Some(room) => (message.in_conversation(room.clone()), Destination::SendPrivate),
            None => (message, Destination::SendPublic),
        };

        let frame = message.to_send_frame(&destination)?;
        self.store.append(message);
        Ok(self.send_frames([frame]))
    }

    fn focus_changed(&mut self, focused: bool) -> Vec<ClientAction> {
        let regained = focused && !self.focused;
        self.focused = focused;

        if regained { self.maybe_send_receipt(ReceiptTrigger::FocusRegained) } else { Vec::new() }
    }

    fn fetched(
        &mut self,
        token: u64,
        result: Result<FetchResult, HistoryError>,
    ) -> Vec<ClientAction> {
        if token != self.token {
            tracing::debug!(token, current = self.token, "stale fetch result discarded");
            return Vec::new();
        }

        match result {
            Ok(FetchResult::Room(room)) => {
                let Conversation::Private { counterpart, room: None } = &self.active else {
                    tracing::debug!(%room, "room resolved for a conversation that needs none");
                    return Vec::new();
                };

                let counterpart = counterpart.clone();

                tracing::info!(%room, "private room resolved");
                self.active = Conversation::Private { counterpart, room: Some(room.clone()) };
                let frames = self.router.switch_context(Target::Room(room.clone()));
                let mut actions = self.send_frames(frames);
                actions.push(ClientAction::Fetch {
                    token: self.token,
                    request: FetchRequest::RoomHistory { room },
                });
                actions
            },
            Ok(FetchResult::History(history)) => {
                let seeded = self.store.seed_history(history);
                tracing::debug!(seeded, "history loaded");

                let unread = self.store.has_unread_from_others(self.identity.user_id);
                self.maybe_send_receipt(ReceiptTrigger::Opened { unread })
            },
            Err(err) => {
                tracing::warn!(error = %err, conversation = %self.active.title(), "failed to load conversation");
                self.store.inject_error(format!("Could not load conversation: {err}"));
                self.history_error = true;
                Vec::new()
            },
        }
    }

    fn handle_packet(&mut self, packet: &Packet, now: E::Instant) -> Vec<ClientAction> {
        let connection_actions = match self.connection.handle_packet(packet, now) {
            Ok(actions) => actions,
            Err(err) => {
                tracing::warn!(error = %err, "dropping frame");
                return Vec::new();
            },
        };

        let mut actions = self.apply_connection(connection_actions);
        if let Packet::Frame(frame) = packet
            && frame.command == Command::Message
            && self.connection.is_connected()
        {
            actions.extend(self.handle_message(frame));
        }
        actions
    }

    fn handle_message(&mut self, frame: &Frame) -> Vec<ClientAction> {
        let Some(subscription) = frame.header(header::SUBSCRIPTION) else {
            tracing::warn!("MESSAGE without subscription header dropped");
            return Vec::new();
        };

        match self.router.route(subscription) {
            None => {
                tracing::debug!(subscription, "message for stale subscription dropped");
                Vec::new()
            },
            Some(Route::Presence) => {
                match PresenceUpdate::from_frame(frame) {
                    Ok(update) => {
                        self.presence.on_event(update);
                    },
                    Err(err) => tracing::warn!(error = %err, subscription, "malformed presence event dropped"),
                }
                Vec::new()
            },
            Some(Route::Conversation) => match ChatMessage::from_frame(frame) {
                Ok(message) => self.ingest(message),
                Err(err) => {
                    tracing::warn!(error = %err, subscription, "malformed chat message dropped");
                    Vec::new()
                },
            },
        }
    }

    fn ingest(&mut self, message: ChatMessage) -> Vec<ClientAction> {
        if let (Some(room), Some(id)) = (self.active.room(), &message.conversation_id)
            && room != id
        {
            tracing::debug!(%id, "message for another conversation dropped");
            return Vec::new();
        }

        let from_counterpart = message.kind == MessageKind::Text
            && self.active.counterpart().is_some_and(|c| c.id == message.sender_id);

        let outcome = self.store.ingest(message);
        if from_counterpart && outcome == Ingested::Appended {
            return self.maybe_send_receipt(ReceiptTrigger::CounterpartMessage);
        }
        Vec::new()
    }

    fn maybe_send_receipt(&mut self, trigger: ReceiptTrigger) -> Vec<ClientAction> {
        if !self.connection.is_connected() {
            if matches!(trigger, ReceiptTrigger::Opened { unread: true } | ReceiptTrigger::FocusRegained) {
                tracing::debug!(?trigger, "receipt deferred until connected");
                self.receipt_deferred = true;
            }
            return Vec::new();
        }

        let ctx = ReceiptContext {
            conversation: &self.active,
            widget_open: self.widget_open,
            focused: self.focused,
            reader: self.identity.user_id,
        };
        let Some(receipt) = self.receipts.maybe_send_receipt(ctx, trigger) else {
            return Vec::new();
        };

        match receipt.to_send_frame(&Destination::MarkRead) {
            Ok(frame) => self.send_frames([frame]),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode read receipt");
                Vec::new()
            },
        }
    }

    /// Translate connection actions, resubscribing on `Established`.
    fn apply_connection(&mut self, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                ConnectionAction::Open => out.push(ClientAction::OpenTransport),
                ConnectionAction::Send(packet) => out.push(ClientAction::Send(packet)),
                ConnectionAction::Close { reason } => {
                    out.push(ClientAction::CloseTransport { reason });
                },
                ConnectionAction::Established => {
                    let frames = self.router.resubscribe();
                    out.extend(self.send_frames(frames));
                    if std::mem::take(&mut self.receipt_deferred) {
                        let unread = self.store.has_unread_from_others(self.identity.user_id);
                        out.extend(self.maybe_send_receipt(ReceiptTrigger::Opened { unread }));
                    }
                },
                ConnectionAction::Lost { reason } => {
                    tracing::warn!(%reason, "connection lost");
                    self.router.connection_lost();
                },
            }
        }
        out
    }

    fn send_frames(&mut self, frames: impl IntoIterator<Item = Frame>) -> Vec<ClientAction> {
        let actions: Vec<ClientAction> =
            frames.into_iter().map(|frame| ClientAction::Send(frame.into())).collect();
        if !actions.is_empty() {
            self.connection.note_sent(self.env.now());
        }
        actions
    }
}
