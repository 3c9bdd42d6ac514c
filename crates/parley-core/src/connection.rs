//! Session layer state machine.
//!
//! Owns the lifecycle of the one transport connection: STOMP handshake,
//! heart-beats, liveness detection and the reconnect loop. Uses the action
//! pattern: methods take time as input and return actions for the driver to
//! execute. This keeps the state machine pure (no I/O) and makes testing
//! straightforward.
//!
//! # State Machine
//!
//! ```text
//!                    connect / retry due
//! ┌──────────────┐ ─────────────────────> ┌────────────┐   CONNECTED   ┌───────────┐
//! │ Disconnected │                        │ Connecting │──────────────>│ Connected │
//! └──────────────┘ <──────┐               └────────────┘               └───────────┘
//!        ^                │ transport closed    │ handshake timeout,        │
//!        │                │ heartbeat timeout   │ open failed, ERROR        │ ERROR
//!        │                └─────────────────────┼───────────────────────────┤
//!        │   retry due                          ↓                           │
//!        └───────────────────────────────── ┌───────┐ <─────────────────────┘
//!                                           │ Error │
//!                                           └───────┘
//! ```
//!
//! Every transition out of `Connecting`/`Connected` schedules a reconnect
//! using the configured [`ReconnectPolicy`] until [`Connection::shutdown`]
//! is called.

use std::time::Duration;

use parley_proto::{
    Command, Frame, HeartBeat, Packet,
    header::{self, STOMP_VERSION},
};

use crate::{env::Environment, error::ConnectionError, reconnect::ReconnectPolicy};

/// Interval at which heart-beats are sent and expected.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(4000);

/// Number of missed inbound heart-beat intervals tolerated before the
/// connection is considered dead.
pub const DEFAULT_HEARTBEAT_TOLERANCE: u32 = 2;

/// Time allowed between opening the transport and receiving CONNECTED.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Actions returned by the connection state machine.
///
/// The driver executes the I/O ones (`Open`, `Send`, `Close`); `Established`
/// and `Lost` are notifications for the layer above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the transport (WebSocket) to the broker.
    Open,

    /// Send this packet to the broker.
    Send(Packet),

    /// Close the transport with this reason.
    Close {
        /// Reason for closing the connection
        reason: String,
    },

    /// Session established. Subscriptions must be (re)issued now.
    Established,

    /// Session lost. Sending is unavailable until the next `Established`.
    Lost {
        /// Why the session ended
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; a reconnect may be scheduled.
    Disconnected,
    /// Transport opening or STOMP handshake in flight.
    Connecting,
    /// CONNECTED received; frames may flow.
    Connected,
    /// Last attempt failed; a reconnect may be scheduled.
    Error,
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Value of the CONNECT `host` header.
    pub host: String,
    /// Optional CONNECT `login` header.
    pub login: Option<String>,
    /// Heart-beat interval requested in both directions.
    pub heartbeat_interval: Duration,
    /// Missed inbound intervals tolerated before declaring the peer dead.
    pub heartbeat_tolerance: u32,
    /// Timeout for completing the handshake.
    pub handshake_timeout: Duration,
    /// Reconnect delay policy.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            login: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_tolerance: DEFAULT_HEARTBEAT_TOLERANCE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Pending reconnect attempt.
#[derive(Debug, Clone, Copy)]
struct Retry<I> {
    since: I,
    delay: Duration,
}

/// Connection state machine
///
/// Manages handshake, heart-beats, timeouts and reconnects for the single
/// broker connection.
///
/// This is a pure state machine - no I/O. Time is passed as parameters to
/// methods that need it; the environment is only used for jitter.
#[derive(Debug, Clone)]
pub struct Connection<E: Environment> {
    env: E,
    state: ConnectionState,
    config: ConnectionConfig,
    /// Driver reported the transport as open for the current attempt.
    transport_open: bool,
    /// When the current attempt started.
    attempt_started: E::Instant,
    last_received: E::Instant,
    last_sent: E::Instant,
    /// Negotiated outbound heart-beat interval. `None` if disabled.
    send_every: Option<Duration>,
    /// Negotiated inbound heart-beat interval. `None` if disabled.
    expect_every: Option<Duration>,
    /// Consecutive failed attempts since the last CONNECTED.
    attempts: u32,
    retry: Option<Retry<E::Instant>>,
    shut_down: bool,
    /// Session id from CONNECTED, if the broker sent one.
    session: Option<String>,
}

impl<E: Environment> Connection<E> {
    /// Create a new connection in [`ConnectionState::Disconnected`].
    pub fn new(env: E, config: ConnectionConfig) -> Self {
        let now = env.now();
        Self {
            env,
            state: ConnectionState::Disconnected,
            config,
            transport_open: false,
            attempt_started: now,
            last_received: now,
            last_sent: now,
            send_every: None,
            expect_every: None,
            attempts: 0,
            retry: None,
            shut_down: false,
            session: None,
        }
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether frames can be published right now.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Consecutive failed attempts since the last successful handshake.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Broker session id. `None` if not connected or not provided.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Whether [`Connection::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Time left until the scheduled reconnect. `None` if none is pending.
    #[must_use]
    pub fn retry_in(&self, now: E::Instant) -> Option<Duration> {
        self.retry.map(|r| r.delay.saturating_sub(now - r.since))
    }

    /// Negotiated `(send_every, expect_every)` heart-beat intervals.
    #[must_use]
    pub fn heartbeats(&self) -> (Option<Duration>, Option<Duration>) {
        (self.send_every, self.expect_every)
    }

    /// Start a connection attempt.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::ShutDown` after [`Connection::shutdown`]
    /// - `ConnectionError::InvalidState` if already connecting or connected
    pub fn connect(&mut self, now: E::Instant) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.shut_down {
            return Err(ConnectionError::ShutDown);
        }
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            return Err(ConnectionError::InvalidState { state: self.state, operation: "connect" });
        }

        self.state = ConnectionState::Connecting;
        self.attempt_started = now;
        self.transport_open = false;
        self.retry = None;

        tracing::info!(attempt = self.attempts, "opening transport");
        Ok(vec![ConnectionAction::Open])
    }

    /// Transport is open; send CONNECT.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` if no attempt is in progress
    pub fn transport_opened(
        &mut self,
        now: E::Instant,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state != ConnectionState::Connecting || self.transport_open {
            return Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "transport_opened",
            });
        }

        self.transport_open = true;
        self.last_received = now;
        self.last_sent = now;

        let heart_beat = HeartBeat::symmetric(self.config.heartbeat_interval);
        let mut connect = Frame::new(Command::Connect)
            .with_header(header::ACCEPT_VERSION, STOMP_VERSION)
            .with_header(header::HOST, self.config.host.clone())
            .with_header(header::HEART_BEAT, heart_beat.to_string());
        if let Some(login) = &self.config.login {
            connect = connect.with_header(header::LOGIN, login.clone());
        }

        Ok(vec![ConnectionAction::Send(connect.into())])
    }

    /// Transport could not be opened.
    ///
    /// Ignored unless an attempt is in progress.
    pub fn transport_failed(&mut self, now: E::Instant, reason: &str) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }

        tracing::warn!(%reason, "transport failed to open");
        self.end_session(now, ConnectionState::Error, &ConnectionError::Transport(reason.into()))
    }

    /// Transport was closed by the peer or the network.
    ///
    /// Ignored if the session already ended (e.g. after a local `Close`).
    pub fn transport_closed(&mut self, now: E::Instant, reason: &str) -> Vec<ConnectionAction> {
        if matches!(self.state, ConnectionState::Disconnected | ConnectionState::Error) {
            self.transport_open = false;
            return Vec::new();
        }

        tracing::warn!(%reason, "transport closed");
        self.transport_open = false;
        let mut actions = self.end_session(
            now,
            ConnectionState::Disconnected,
            &ConnectionError::Transport(reason.into()),
        );
        // Transport is already gone; nothing to close.
        actions.retain(|a| !matches!(a, ConnectionAction::Close { .. }));
        actions
    }

    /// Record outbound traffic. Any frame counts as a heart-beat.
    pub fn note_sent(&mut self, now: E::Instant) {
        self.last_sent = now;
    }

    /// Process an inbound packet.
    ///
    /// Handles heart-beats, CONNECTED and ERROR. MESSAGE and RECEIPT frames
    /// are accepted while connected and left to the caller to route.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnexpectedFrame` for frames invalid in the
    ///   current state (e.g. MESSAGE before CONNECTED)
    pub fn handle_packet(
        &mut self,
        packet: &Packet,
        now: E::Instant,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.last_received = now;

        let Packet::Frame(frame) = packet else {
            return Ok(Vec::new());
        };

        match (self.state, frame.command) {
            (ConnectionState::Connecting, Command::Connected) => {
                let server = frame
                    .header(header::HEART_BEAT)
                    .and_then(|v| v.parse::<HeartBeat>().ok())
                    .unwrap_or_default();
                let client = HeartBeat::symmetric(self.config.heartbeat_interval);
                let (send_every, expect_every) = HeartBeat::negotiate(client, server);

                self.state = ConnectionState::Connected;
                self.send_every = send_every;
                self.expect_every = expect_every;
                self.attempts = 0;
                self.session = frame.header(header::SESSION).map(str::to_string);

                tracing::info!(
                    session = self.session.as_deref().unwrap_or("-"),
                    ?send_every,
                    ?expect_every,
                    "connected"
                );
                Ok(vec![ConnectionAction::Established])
            },

            (ConnectionState::Connecting | ConnectionState::Connected, Command::Error) => {
                let reason = frame
                    .header(header::MESSAGE)
                    .map(str::to_string)
                    .or_else(|| frame.body_str().ok().map(str::to_string))
                    .unwrap_or_else(|| "unspecified".to_string());

                tracing::warn!(%reason, "broker error");
                Ok(self.end_session(now, ConnectionState::Error, &ConnectionError::Broker(reason)))
            },

            (ConnectionState::Connected, Command::Message | Command::Receipt) => Ok(Vec::new()),

            (state, command) => Err(ConnectionError::UnexpectedFrame { state, command }),
        }
    }

    /// Process periodic maintenance: heart-beats, timeouts and due retries.
    pub fn tick(&mut self, now: E::Instant) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting => {
                let elapsed = now - self.attempt_started;
                if elapsed > self.config.handshake_timeout {
                    let err = ConnectionError::HandshakeTimeout { elapsed };
                    tracing::warn!(?elapsed, "handshake timeout");
                    return self.end_session(now, ConnectionState::Error, &err);
                }
                Vec::new()
            },

            ConnectionState::Connected => {
                if let Some(expect) = self.expect_every {
                    let elapsed = now - self.last_received;
                    let grace = expect.saturating_mul(self.config.heartbeat_tolerance.max(1));
                    if elapsed > grace {
                        let err = ConnectionError::HeartbeatTimeout { elapsed };
                        tracing::warn!(?elapsed, "no heartbeat from broker");
                        return self.end_session(now, ConnectionState::Disconnected, &err);
                    }
                }

                if let Some(every) = self.send_every
                    && now - self.last_sent >= every
                {
                    self.last_sent = now;
                    return vec![ConnectionAction::Send(Packet::Heartbeat)];
                }
                Vec::new()
            },

            ConnectionState::Disconnected | ConnectionState::Error => match self.retry {
                Some(retry) if now - retry.since >= retry.delay => {
                    self.connect(now).unwrap_or_default()
                },
                _ => Vec::new(),
            },
        }
    }

    /// Tear down for good. Stops the reconnect loop.
    pub fn shutdown(&mut self) -> Vec<ConnectionAction> {
        self.shut_down = true;
        self.retry = None;

        let reason = ConnectionError::ShutDown.to_string();
        let actions = match self.state {
            ConnectionState::Connected => vec![
                ConnectionAction::Send(Frame::new(Command::Disconnect).into()),
                ConnectionAction::Close { reason },
            ],
            ConnectionState::Connecting => vec![ConnectionAction::Close { reason }],
            ConnectionState::Disconnected | ConnectionState::Error => Vec::new(),
        };

        self.state = ConnectionState::Disconnected;
        self.transport_open = false;
        self.send_every = None;
        self.expect_every = None;
        self.session = None;
        actions
    }

    /// Leave the current session and schedule the next attempt.
    fn end_session(
        &mut self,
        now: E::Instant,
        next: ConnectionState,
        cause: &ConnectionError,
    ) -> Vec<ConnectionAction> {
        let reason = cause.to_string();

        self.state = next;
        self.transport_open = false;
        self.send_every = None;
        self.expect_every = None;
        self.session = None;
        self.schedule_retry(now);

        vec![ConnectionAction::Close { reason: reason.clone() }, ConnectionAction::Lost { reason }]
    }

    fn schedule_retry(&mut self, now: E::Instant) {
        if self.shut_down {
            return;
        }

        let delay = self.config.reconnect.delay(self.attempts, self.env.random_u64());
        self.attempts = self.attempts.saturating_add(1);
        self.retry = Some(Retry { since: now, delay });

        tracing::info!(?delay, attempt = self.attempts, "reconnect scheduled");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[derive(Debug, Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            // Deterministic for tests
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            reconnect: ReconnectPolicy::fixed(Duration::from_millis(5000)),
            ..ConnectionConfig::default()
        }
    }

    fn connected_frame(heart_beat: &str) -> Packet {
        Frame::new(Command::Connected)
            .with_header(header::VERSION, "1.2")
            .with_header(header::HEART_BEAT, heart_beat)
            .into()
    }

    fn connected(t0: Instant) -> Connection<TestEnv> {
        let mut conn = Connection::new(TestEnv, config());
        conn.connect(t0).unwrap();
        conn.transport_opened(t0).unwrap();
        conn.handle_packet(&connected_frame("4000,4000"), t0).unwrap();
        conn
    }

    #[test]
    fn connection_lifecycle() {
        let t0 = Instant::now();
        let mut conn = Connection::new(TestEnv, config());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect(t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Open]);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let actions = conn.transport_opened(t0).unwrap();
        let [ConnectionAction::Send(Packet::Frame(connect))] = actions.as_slice() else {
            panic!("expected CONNECT, got {actions:?}");
        };
        assert_eq!(connect.command, Command::Connect);
        assert_eq!(connect.header(header::ACCEPT_VERSION), Some("1.2"));
        assert_eq!(connect.header(header::HEART_BEAT), Some("4000,4000"));

        let actions = conn.handle_packet(&connected_frame("4000,4000"), t0).unwrap();
        assert_eq!(actions, vec![ConnectionAction::Established]);
        assert!(conn.is_connected());
        assert_eq!(
            conn.heartbeats(),
            (Some(Duration::from_millis(4000)), Some(Duration::from_millis(4000)))
        );
    }

    #[test]
    fn connect_twice_is_rejected() {
        let t0 = Instant::now();
        let mut conn = Connection::new(TestEnv, config());
        conn.connect(t0).unwrap();
        assert!(matches!(conn.connect(t0), Err(ConnectionError::InvalidState { .. })));
    }

    #[test]
    fn message_before_connected_is_unexpected() {
        let t0 = Instant::now();
        let mut conn = Connection::new(TestEnv, config());
        conn.connect(t0).unwrap();
        conn.transport_opened(t0).unwrap();

        let message = Frame::new(Command::Message).into();
        let result = conn.handle_packet(&message, t0);
        assert!(matches!(result, Err(ConnectionError::UnexpectedFrame { .. })));
    }

    #[test]
    fn sends_heartbeat_every_interval() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        assert!(conn.tick(t0 + Duration::from_millis(3999)).is_empty());

        let t1 = t0 + Duration::from_millis(4000);
        conn.handle_packet(&Packet::Heartbeat, t1).unwrap();
        assert_eq!(conn.tick(t1), vec![ConnectionAction::Send(Packet::Heartbeat)]);

        // Outbound traffic resets the heartbeat timer
        let t2 = t1 + Duration::from_millis(3000);
        conn.note_sent(t2);
        conn.handle_packet(&Packet::Heartbeat, t2).unwrap();
        assert!(conn.tick(t1 + Duration::from_millis(4000)).is_empty());
    }

    #[test]
    fn missing_heartbeats_drop_the_session() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        // Grace window is 2 x 4000ms; keep sending so only inbound matters
        conn.note_sent(t0 + Duration::from_millis(8000));
        assert!(conn.tick(t0 + Duration::from_millis(8000)).is_empty());

        let actions = conn.tick(t0 + Duration::from_millis(8001));
        assert!(matches!(actions.as_slice(), [
            ConnectionAction::Close { .. },
            ConnectionAction::Lost { .. }
        ]));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(conn.retry_in(t0 + Duration::from_millis(8001)), Some(Duration::from_millis(5000)));
    }

    #[test]
    fn disabled_heartbeat_never_times_out() {
        let t0 = Instant::now();
        let mut conn = Connection::new(TestEnv, config());
        conn.connect(t0).unwrap();
        conn.transport_opened(t0).unwrap();
        conn.handle_packet(&connected_frame("0,0"), t0).unwrap();

        assert!(conn.tick(t0 + Duration::from_secs(3600)).is_empty());
        assert!(conn.is_connected());
    }

    #[test]
    fn handshake_timeout_schedules_retry() {
        let t0 = Instant::now();
        let mut conn = Connection::new(TestEnv, config());
        conn.connect(t0).unwrap();
        conn.transport_opened(t0).unwrap();

        assert!(conn.tick(t0 + DEFAULT_HANDSHAKE_TIMEOUT).is_empty());

        let actions = conn.tick(t0 + DEFAULT_HANDSHAKE_TIMEOUT + Duration::from_millis(1));
        assert_eq!(actions.len(), 2);
        assert_eq!(conn.state(), ConnectionState::Error);
        assert_eq!(conn.attempts(), 1);
    }

    #[test]
    fn reconnects_after_delay_until_shutdown() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        let actions = conn.transport_closed(t0, "reset by peer");
        assert!(matches!(actions.as_slice(), [ConnectionAction::Lost { .. }]));
        assert!(!conn.is_connected());

        // Duplicate close notification is ignored
        assert!(conn.transport_closed(t0, "reset by peer").is_empty());

        assert!(conn.tick(t0 + Duration::from_millis(4999)).is_empty());
        let t1 = t0 + Duration::from_millis(5000);
        assert_eq!(conn.tick(t1), vec![ConnectionAction::Open]);

        // Attempt fails, next one is scheduled again
        let actions = conn.transport_failed(t1, "connection refused");
        assert!(matches!(actions.as_slice(), [ConnectionAction::Close { .. }, ConnectionAction::Lost { .. }]));
        assert_eq!(conn.attempts(), 2);

        conn.shutdown();
        assert!(conn.tick(t1 + Duration::from_secs(600)).is_empty());
        assert!(matches!(conn.connect(t1), Err(ConnectionError::ShutDown)));
    }

    #[test]
    fn attempts_reset_on_connected() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.transport_closed(t0, "gone");
        assert_eq!(conn.attempts(), 1);

        let t1 = t0 + Duration::from_millis(5000);
        conn.tick(t1);
        conn.transport_opened(t1).unwrap();
        conn.handle_packet(&connected_frame("4000,4000"), t1).unwrap();
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn broker_error_frame_ends_session() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        let error = Frame::new(Command::Error).with_header(header::MESSAGE, "bad destination");
        let actions = conn.handle_packet(&error.into(), t0).unwrap();

        assert_eq!(conn.state(), ConnectionState::Error);
        let [ConnectionAction::Close { .. }, ConnectionAction::Lost { reason }] = actions.as_slice()
        else {
            panic!("expected Close + Lost, got {actions:?}");
        };
        assert!(reason.contains("bad destination"));
    }

    #[test]
    fn shutdown_sends_disconnect() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        let actions = conn.shutdown();
        assert!(matches!(
            actions.as_slice(),
            [ConnectionAction::Send(Packet::Frame(f)), ConnectionAction::Close { .. }]
                if f.command == Command::Disconnect
        ));
        assert!(conn.is_shut_down());
        assert!(conn.transport_closed(t0, "closed").is_empty());
    }
}
