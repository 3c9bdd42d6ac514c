//! In-memory STOMP broker for simulation.
//!
//! `SimBroker` models the chat backend the client talks to: it answers the
//! STOMP handshake, tracks subscriptions per session, assigns message ids,
//! fans published messages out to subscribers, processes read receipts and
//! keeps the histories the REST collaborator serves.
//!
//! Delivery model:
//! - global messages go to `/topic/public`
//! - private messages go to `/topic/conversation.{id}`
//! - read receipts go to `/queue/conversation.{id}`
//! - presence transitions go to `/topic/presence`
//!
//! Outbound packets are queued per session and pulled by the driver, which
//! gives tests full control over interleaving.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use parley_core::connection::DEFAULT_HEARTBEAT_INTERVAL;
use parley_proto::{
    Command, ConversationId, Destination, Frame, HeartBeat, Packet, Payload, UserId, header,
    payloads::{
        ChatMessage, JSON_CONTENT_TYPE, MarkRead, MessageKind, MessageStatus, PresenceUpdate,
        UserSummary,
    },
};

/// Broker-side session identifier.
pub type SessionId = u64;

/// Broker shared between the driver, the history service and the test.
pub type SharedBroker = Arc<Mutex<SimBroker>>;

/// One transport connection as seen by the broker.
#[derive(Debug, Default)]
struct Session {
    /// User named by the CONNECT `login` header.
    user: Option<UserId>,
    /// CONNECTED was sent and no DISCONNECT received.
    connected: bool,
    /// Subscription id to destination.
    subscriptions: BTreeMap<String, Destination>,
    /// Packets waiting to be pulled by the driver.
    outbound: VecDeque<Packet>,
}

/// A private room between two users.
#[derive(Debug, Clone)]
pub struct Room {
    /// The two participants, smaller id first.
    pub members: (UserId, UserId),
    /// Messages, oldest first.
    pub history: Vec<ChatMessage>,
}

/// In-memory broker and backend.
#[derive(Debug)]
pub struct SimBroker {
    sessions: BTreeMap<SessionId, Session>,
    next_session: SessionId,
    next_message: u64,
    next_delivery: u64,
    accepting: bool,
    heart_beat: HeartBeat,
    users: BTreeMap<UserId, String>,
    public: Vec<ChatMessage>,
    rooms: BTreeMap<ConversationId, Room>,
    mark_reads: Vec<MarkRead>,
}

impl Default for SimBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBroker {
    /// Empty broker accepting connections, advertising the default
    /// heart-beat in both directions.
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_session: 1,
            next_message: 1,
            next_delivery: 1,
            accepting: true,
            heart_beat: HeartBeat::symmetric(DEFAULT_HEARTBEAT_INTERVAL),
            users: BTreeMap::new(),
            public: Vec::new(),
            rooms: BTreeMap::new(),
            mark_reads: Vec::new(),
        }
    }

    /// Wrap for sharing.
    pub fn shared(self) -> SharedBroker {
        Arc::new(Mutex::new(self))
    }

    /// Make a user known to search and receipts.
    pub fn register_user(&mut self, id: UserId, username: impl Into<String>) {
        self.users.insert(id, username.into());
    }

    /// Users whose name contains `query`, case-insensitively.
    pub fn search_users(&self, query: &str) -> Vec<UserSummary> {
        let query = query.to_lowercase();
        self.users
            .iter()
            .filter(|(_, name)| name.to_lowercase().contains(&query))
            .map(|(id, name)| UserSummary { id: *id, username: name.clone() })
            .collect()
    }

    /// Whether new transports are accepted.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Refuse or accept new transports. Existing sessions are unaffected.
    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    /// Heart-beat advertised in CONNECTED.
    pub fn set_heart_beat(&mut self, heart_beat: HeartBeat) {
        self.heart_beat = heart_beat;
    }

    /// Open a transport. `None` while not accepting.
    pub fn open_session(&mut self) -> Option<SessionId> {
        if !self.accepting {
            return None;
        }

        let id = self.next_session;
        self.next_session += 1;
        self.sessions.insert(id, Session::default());
        tracing::debug!(session = id, "transport opened");
        Some(id)
    }

    /// Drop a transport, publishing OFFLINE if it was the user's last
    /// connected session.
    pub fn close_session(&mut self, session: SessionId) {
        let Some(closed) = self.sessions.remove(&session) else {
            return;
        };
        tracing::debug!(session, "transport closed");

        if closed.connected
            && let Some(user) = closed.user
        {
            self.user_left(user);
        }
    }

    /// Number of open transports.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether `session` completed the handshake.
    pub fn is_connected(&self, session: SessionId) -> bool {
        self.sessions.get(&session).is_some_and(|s| s.connected)
    }

    /// Destinations `session` is subscribed to, by subscription id.
    pub fn subscriptions(&self, session: SessionId) -> Vec<Destination> {
        self.sessions
            .get(&session)
            .map(|s| s.subscriptions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of subscriptions to `destination` across all sessions.
    pub fn subscriber_count(&self, destination: &Destination) -> usize {
        self.sessions
            .values()
            .flat_map(|s| s.subscriptions.values())
            .filter(|d| *d == destination)
            .count()
    }

    /// Next queued packet for `session`.
    pub fn pop_outbound(&mut self, session: SessionId) -> Option<Packet> {
        self.sessions.get_mut(&session)?.outbound.pop_front()
    }

    /// Whether anything is queued for `session`.
    pub fn has_outbound(&self, session: SessionId) -> bool {
        self.sessions.get(&session).is_some_and(|s| !s.outbound.is_empty())
    }

    /// Queue a heart-beat to every connected session.
    pub fn heartbeat_all(&mut self) {
        for session in self.sessions.values_mut().filter(|s| s.connected) {
            session.outbound.push_back(Packet::Heartbeat);
        }
    }

    /// Messages of the global room, oldest first.
    pub fn public_history(&self) -> &[ChatMessage] {
        &self.public
    }

    /// Messages of a private room, oldest first.
    pub fn room_history(&self, room: &ConversationId) -> Option<&[ChatMessage]> {
        self.rooms.get(room).map(|r| r.history.as_slice())
    }

    /// Every receipt received on `/app/mark-read`, in arrival order.
    pub fn mark_reads(&self) -> &[MarkRead] {
        &self.mark_reads
    }

    /// Private room of `a` and `b`, created on first use.
    pub fn create_private_room(&mut self, a: UserId, b: UserId) -> ConversationId {
        let members = (a.min(b), a.max(b));
        if let Some((id, _)) = self.rooms.iter().find(|(_, room)| room.members == members) {
            return id.clone();
        }

        let id = ConversationId::from(format!("{}-{}", members.0, members.1));
        self.rooms.insert(id.clone(), Room { members, history: Vec::new() });
        tracing::debug!(room = %id, "private room created");
        id
    }

    /// Publish a message into the global room as if a user sent it.
    pub fn publish_public(&mut self, message: ChatMessage) -> u64 {
        let message = self.assign_id(message);
        let id = message.server_id.unwrap_or_default();
        self.public.push(message.clone());
        self.deliver(&Destination::PublicTopic, &message);
        id
    }

    /// Publish a message into a private room as if a user sent it.
    ///
    /// Returns `None` if the room does not exist.
    pub fn publish_private(&mut self, room: &ConversationId, message: ChatMessage) -> Option<u64> {
        let message = self.assign_id(message.in_conversation(room.clone()));
        let id = message.server_id?;
        self.rooms.get_mut(room)?.history.push(message.clone());
        self.deliver(&Destination::ConversationTopic(room.clone()), &message);
        Some(id)
    }

    /// Publish a presence transition.
    pub fn publish_presence(&mut self, update: PresenceUpdate) {
        self.deliver(&Destination::PresenceTopic, &update);
    }

    /// Deliver an arbitrary body to subscribers of `destination`.
    pub fn publish_raw(&mut self, destination: &Destination, body: &str) {
        let body = body.as_bytes().to_vec();
        self.fan_out(destination, |frame| frame.with_body(body.clone()));
    }

    /// Handle one packet sent by the client on `session`.
    pub fn receive(&mut self, session: SessionId, packet: &Packet) {
        let Packet::Frame(frame) = packet else {
            return;
        };
        if !self.sessions.contains_key(&session) {
            return;
        }

        match frame.command {
            Command::Connect | Command::Stomp => self.on_connect(session, frame),
            Command::Subscribe => self.on_subscribe(session, frame),
            Command::Unsubscribe => self.on_unsubscribe(session, frame),
            Command::Send => self.on_send(session, frame),
            Command::Disconnect => self.on_disconnect(session),
            other => self.reject(session, &format!("unexpected {}", other.as_str())),
        }
    }

    fn on_connect(&mut self, session: SessionId, frame: &Frame) {
        let user = frame.header(header::LOGIN).and_then(|l| l.parse::<UserId>().ok());
        let connected = Frame::new(Command::Connected)
            .with_header(header::VERSION, header::STOMP_VERSION)
            .with_header(header::HEART_BEAT, self.heart_beat.to_string())
            .with_header(header::SESSION, format!("sim-{session}"));

        let Some(state) = self.sessions.get_mut(&session) else {
            return;
        };
        state.user = user;
        state.connected = true;
        state.outbound.push_back(connected.into());

        if let Some(user) = user {
            self.publish_presence(PresenceUpdate::online(user));
        }
    }

    fn on_subscribe(&mut self, session: SessionId, frame: &Frame) {
        let parsed = frame.require_header(header::ID).and_then(|id| {
            let destination = frame.require_header(header::DESTINATION)?.parse::<Destination>()?;
            Ok((id.to_string(), destination))
        });

        match parsed {
            Ok((_, destination)) if !destination.is_subscribable() => {
                self.reject(session, &format!("cannot subscribe to {destination}"));
            },
            Ok((id, destination)) => {
                if let Some(state) = self.sessions.get_mut(&session) {
                    state.subscriptions.insert(id, destination);
                }
            },
            Err(err) => self.reject(session, &err.to_string()),
        }
    }

    fn on_unsubscribe(&mut self, session: SessionId, frame: &Frame) {
        let Some(id) = frame.header(header::ID) else {
            self.reject(session, "UNSUBSCRIBE without id");
            return;
        };
        if let Some(state) = self.sessions.get_mut(&session) {
            state.subscriptions.remove(id);
        }
    }

    fn on_send(&mut self, session: SessionId, frame: &Frame) {
        let destination = match frame
            .require_header(header::DESTINATION)
            .and_then(str::parse::<Destination>)
        {
            Ok(destination) => destination,
            Err(err) => return self.reject(session, &err.to_string()),
        };

        match destination {
            Destination::SendPublic => match ChatMessage::from_frame(frame) {
                Ok(message) => {
                    self.publish_public(message);
                },
                Err(err) => self.reject(session, &err.to_string()),
            },
            Destination::SendPrivate => {
                let message = match ChatMessage::from_frame(frame) {
                    Ok(message) => message,
                    Err(err) => return self.reject(session, &err.to_string()),
                };
                let Some(room) = message.conversation_id.clone() else {
                    return self.reject(session, "private message without conversationId");
                };
                if self.publish_private(&room, message).is_none() {
                    self.reject(session, &format!("unknown conversation {room}"));
                }
            },
            Destination::MarkRead => match MarkRead::from_frame(frame) {
                Ok(receipt) => self.mark_read(receipt),
                Err(err) => self.reject(session, &err.to_string()),
            },
            other => self.reject(session, &format!("cannot send to {other}")),
        }
    }

    fn on_disconnect(&mut self, session: SessionId) {
        let user = self.sessions.get_mut(&session).and_then(|state| {
            let was_connected = std::mem::replace(&mut state.connected, false);
            state.subscriptions.clear();
            if was_connected { state.user } else { None }
        });

        if let Some(user) = user {
            self.user_left(user);
        }
    }

    /// Flip the reader's unread messages and notify the room.
    fn mark_read(&mut self, receipt: MarkRead) {
        let reader = receipt.reader_id;
        let room_id = receipt.conversation_id.clone();
        self.mark_reads.push(receipt);

        let Some(room) = self.rooms.get_mut(&room_id) else {
            tracing::debug!(room = %room_id, "receipt for unknown room ignored");
            return;
        };

        let read_ids: Vec<u64> = room
            .history
            .iter_mut()
            .filter(|m| {
                m.sender_id != reader
                    && m.status == MessageStatus::Sent
                    && matches!(m.kind, MessageKind::Text | MessageKind::Join)
            })
            .filter_map(|m| {
                m.status = MessageStatus::Read;
                m.server_id
            })
            .collect();

        if read_ids.is_empty() {
            return;
        }

        let reader_name = self.users.get(&reader).cloned().unwrap_or_else(|| reader.to_string());
        let mut notice = ChatMessage::read_receipt(reader_name, reader, room_id.clone());
        notice.read_ids = read_ids;
        self.deliver(&Destination::ConversationQueue(room_id), &notice);
    }

    fn user_left(&mut self, user: UserId) {
        let still_online =
            self.sessions.values().any(|s| s.connected && s.user == Some(user));
        if !still_online {
            self.publish_presence(PresenceUpdate::offline(user));
        }
    }

    fn assign_id(&mut self, message: ChatMessage) -> ChatMessage {
        let id = self.next_message;
        self.next_message += 1;
        message.with_server_id(id)
    }

    fn deliver<P: Payload>(&mut self, destination: &Destination, payload: &P) {
        match serde_json::to_vec(payload) {
            Ok(body) => self.fan_out(destination, |frame| {
                frame.with_header(header::CONTENT_TYPE, JSON_CONTENT_TYPE).with_body(body.clone())
            }),
            Err(err) => tracing::warn!(error = %err, %destination, "failed to encode payload"),
        }
    }

    fn fan_out(&mut self, destination: &Destination, body: impl Fn(Frame) -> Frame) {
        for session in self.sessions.values_mut().filter(|s| s.connected) {
            for (sub_id, subscribed) in &session.subscriptions {
                if subscribed != destination {
                    continue;
                }

                let message_id = self.next_delivery;
                self.next_delivery += 1;
                let frame = Frame::new(Command::Message)
                    .with_header(header::DESTINATION, destination.to_string())
                    .with_header(header::SUBSCRIPTION, sub_id.clone())
                    .with_header(header::MESSAGE_ID, format!("m-{message_id}"));
                session.outbound.push_back(body(frame).into());
            }
        }
    }

    /// Report a fatal session error the way STOMP brokers do.
    fn reject(&mut self, session: SessionId, reason: &str) {
        tracing::debug!(session, %reason, "rejecting frame");
        if let Some(state) = self.sessions.get_mut(&session) {
            let error = Frame::new(Command::Error).with_header(header::MESSAGE, reason);
            state.outbound.push_back(error.into());
            state.connected = false;
            state.subscriptions.clear();
        }
    }
}
