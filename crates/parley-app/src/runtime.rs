//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`Client`]: chat state machine
//! - [`Driver`]: Platform-specific I/O
//!
//! Events are dispatched one at a time; every action the client returns is
//! executed before the next event is polled.

use parley_client::{Client, ClientAction, ClientEvent, Environment, Friend};
use parley_proto::payloads::UserSummary;

use crate::{AppEvent, ChatView, Driver, HELP, UserIntent};

/// Generic runtime that orchestrates Client and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    client: Client<E>,
    /// Result of the last user search, used to resolve `/open <name>`.
    roster: Vec<UserSummary>,
    notice: Option<String>,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a new runtime with the given driver and client.
    pub fn new(driver: D, client: Client<E>) -> Self {
        Self { driver, client, roster: Vec::new(), notice: None }
    }

    /// Run the main event loop until the user quits.
    ///
    /// This is the core orchestration loop that:
    /// 1. Starts the connection and opens the global room
    /// 2. Polls the driver for the next event and dispatches it
    /// 3. Ticks the client after every poll
    /// 4. Shuts the session down on quit
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.start().await?;

        loop {
            if let Some(event) = self.driver.poll_event().await?
                && self.step(event).await?
            {
                break;
            }
            self.tick().await?;
        }

        self.shutdown().await
    }

    /// Start connecting and open the global room.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn start(&mut self) -> Result<(), D::Error> {
        let now = self.driver.now();
        self.dispatch(ClientEvent::Start { now }).await?;
        self.dispatch(ClientEvent::OpenGlobal).await?;
        self.render()
    }

    /// Process one event. Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn step(&mut self, event: AppEvent) -> Result<bool, D::Error> {
        let now = self.driver.now();
        let client_event = match event {
            AppEvent::User(intent) => {
                self.notice = None;
                match self.intent(intent) {
                    Intent::Quit => return Ok(true),
                    Intent::Handled => return self.render().map(|()| false),
                    Intent::Client(event) => event,
                }
            },
            AppEvent::TransportOpened => ClientEvent::TransportOpened { now },
            AppEvent::TransportFailed { reason } => ClientEvent::TransportFailed { now, reason },
            AppEvent::TransportClosed { reason } => ClientEvent::TransportClosed { now, reason },
            AppEvent::Packet(packet) => ClientEvent::PacketReceived { packet, now },
            AppEvent::Fetched { token, result } => ClientEvent::Fetched { token, result },
            AppEvent::UsersFound(Ok(users)) => {
                self.notice = Some(match users.len() {
                    0 => "no users found".to_string(),
                    n => format!("{n} users found, /open <name> to chat"),
                });
                self.roster = users;
                return self.render().map(|()| false);
            },
            AppEvent::UsersFound(Err(err)) => {
                tracing::warn!(error = %err, "user search failed");
                self.notice = Some(format!("search failed: {err}"));
                return self.render().map(|()| false);
            },
        };

        self.dispatch(client_event).await?;
        self.render()?;
        Ok(false)
    }

    /// Advance timers: heart-beats, timeouts, reconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn tick(&mut self) -> Result<(), D::Error> {
        let now = self.driver.now();
        let connected = self.client.is_connected();
        self.dispatch(ClientEvent::Tick { now }).await?;

        if connected != self.client.is_connected() {
            self.render()?;
        }
        Ok(())
    }

    /// Tear the session down and stop the driver.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn shutdown(&mut self) -> Result<(), D::Error> {
        self.dispatch(ClientEvent::Shutdown).await?;
        self.driver.stop();
        Ok(())
    }

    /// The chat client.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutable access to the driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Current view snapshot.
    pub fn view(&self) -> ChatView {
        ChatView::build(&self.client, &self.roster, self.notice.as_deref())
    }

    fn intent(&mut self, intent: UserIntent) -> Intent<E::Instant> {
        match intent {
            UserIntent::Quit => Intent::Quit,
            UserIntent::Help => {
                self.notice = Some(HELP.to_string());
                Intent::Handled
            },
            UserIntent::Search { query } => {
                self.driver.search_users(query);
                Intent::Handled
            },
            UserIntent::Open { target } => match self.resolve(&target) {
                Some(friend) => Intent::Client(ClientEvent::OpenWith { friend }),
                None => {
                    self.notice = Some(format!("unknown user {target}, try /find"));
                    Intent::Handled
                },
            },
            UserIntent::OpenGlobal => Intent::Client(ClientEvent::OpenGlobal),
            UserIntent::ShowWidget => Intent::Client(ClientEvent::OpenWidget),
            UserIntent::HideWidget => Intent::Client(ClientEvent::CloseWidget),
            UserIntent::Focus(focused) => Intent::Client(ClientEvent::FocusChanged { focused }),
            UserIntent::Send(content) => Intent::Client(ClientEvent::Send { content }),
        }
    }

    /// Resolve a user id or a username from the last search.
    fn resolve(&self, target: &str) -> Option<Friend> {
        if let Ok(id) = target.parse::<u64>() {
            let username = self
                .roster
                .iter()
                .find(|u| u.id == id)
                .map_or_else(|| format!("user-{id}"), |u| u.username.clone());
            return Some(Friend::new(id, username));
        }

        self.roster
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(target))
            .map(|u| Friend::new(u.id, u.username.clone()))
    }

    async fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Result<(), D::Error> {
        match self.client.handle(event) {
            Ok(actions) => self.execute(actions).await,
            Err(err) => {
                tracing::warn!(error = %err, "event rejected");
                self.notice = Some(err.to_string());
                Ok(())
            },
        }
    }

    async fn execute(&mut self, actions: Vec<ClientAction>) -> Result<(), D::Error> {
        for action in actions {
            match action {
                ClientAction::OpenTransport => self.driver.open_transport(),
                ClientAction::CloseTransport { reason } => self.driver.close_transport(&reason),
                ClientAction::Send(packet) => {
                    // A failed send means the transport is going away; the
                    // close event that follows drives recovery.
                    if let Err(err) = self.driver.send_packet(packet).await {
                        tracing::warn!(error = %err, "send failed");
                    }
                },
                ClientAction::Fetch { token, request } => self.driver.fetch(token, request),
            }
        }
        Ok(())
    }

    fn render(&mut self) -> Result<(), D::Error> {
        let view = self.view();
        self.driver.render(&view)
    }
}

/// Outcome of translating a user intent.
enum Intent<I> {
    Quit,
    Handled,
    Client(ClientEvent<I>),
}
