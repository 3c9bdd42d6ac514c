//! Terminal driver for the line client.
//!
//! Implements the [`Driver`] trait with stdin lines for input, stdout for
//! output, tokio-tungstenite for the broker socket and reqwest for the REST
//! API. Socket connects and REST calls run as spawned tasks; their outcomes
//! come back through channels polled in [`Driver::poll_event`].

use std::{
    io::{self, Stdout, Write},
    sync::Arc,
    time::{Duration, Instant},
};

use parley_app::{AppEvent, ChatView, Driver, UserIntent, parse_line};
use parley_client::{
    FetchRequest, HistoryService,
    transport::{self, ConnectedClient, Inbound, TransportError},
};
use parley_proto::Packet;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::mpsc,
};

use crate::Printer;

/// Longest wait in `poll_event` before the runtime ticks the client.
const TICK: Duration = Duration::from_millis(100);

/// Capacity of the completion channels.
const CHANNEL_CAPACITY: usize = 64;

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// I/O error on stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Packet sent while no socket is open.
    #[error("not connected")]
    NotConnected,
}

/// Outcome of a spawned connect, tagged with its attempt number.
type Connected = (u64, Result<ConnectedClient, TransportError>);

/// What woke `poll_event` up.
enum Wake {
    Completed(AppEvent),
    Connected(Connected),
    Inbound(Option<Inbound>),
    Line(io::Result<Option<String>>),
    Tick,
}

/// Terminal driver implementing the [`Driver`] trait.
pub struct StdioDriver {
    server: String,
    history: Arc<dyn HistoryService>,
    stdin: Lines<BufReader<Stdin>>,
    stdin_open: bool,
    stdout: Stdout,
    printer: Printer,
    connection: Option<ConnectedClient>,
    /// Bumped on every open and close; stale connects are dropped.
    attempt: u64,
    connected_tx: mpsc::Sender<Connected>,
    connected_rx: mpsc::Receiver<Connected>,
    completed_tx: mpsc::Sender<AppEvent>,
    completed_rx: mpsc::Receiver<AppEvent>,
}

impl StdioDriver {
    /// Driver for the broker at `server` (a `ws://` or `wss://` URL) and the
    /// REST API behind `history`.
    pub fn new(server: impl Into<String>, history: Arc<dyn HistoryService>) -> Self {
        let (connected_tx, connected_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (completed_tx, completed_rx) = mpsc::channel(CHANNEL_CAPACITY);

        Self {
            server: server.into(),
            history,
            stdin: BufReader::new(tokio::io::stdin()).lines(),
            stdin_open: true,
            stdout: io::stdout(),
            printer: Printer::new(),
            connection: None,
            attempt: 0,
            connected_tx,
            connected_rx,
            completed_tx,
            completed_rx,
        }
    }

    fn on_connected(&mut self, (attempt, result): Connected) -> Option<AppEvent> {
        if attempt != self.attempt {
            tracing::debug!(attempt, current = self.attempt, "stale connect dropped");
            return None;
        }

        match result {
            Ok(client) => {
                self.connection = Some(client);
                Some(AppEvent::TransportOpened)
            },
            Err(e) => Some(AppEvent::TransportFailed { reason: e.to_string() }),
        }
    }

    fn on_inbound(&mut self, inbound: Option<Inbound>) -> AppEvent {
        match inbound {
            Some(Inbound::Packet(packet)) => AppEvent::Packet(packet),
            Some(Inbound::Closed { reason }) => {
                self.connection = None;
                AppEvent::TransportClosed { reason }
            },
            None => {
                self.connection = None;
                AppEvent::TransportClosed { reason: "transport task ended".to_string() }
            },
        }
    }

    fn on_line(&mut self, line: Option<String>) -> io::Result<Option<AppEvent>> {
        let Some(line) = line else {
            self.stdin_open = false;
            return Ok(Some(AppEvent::User(UserIntent::Quit)));
        };

        match parse_line(&line) {
            Ok(intent) => Ok(intent.map(AppEvent::User)),
            Err(e) => {
                writeln!(self.stdout, "> {e}")?;
                Ok(None)
            },
        }
    }
}

/// Next inbound item of `connection`, or never if there is none.
async fn next_inbound(connection: Option<&mut ConnectedClient>) -> Option<Inbound> {
    match connection {
        Some(connection) => connection.from_server.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver for StdioDriver {
    type Error = DriverError;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        let wake = tokio::select! {
            biased;

            Some(event) = self.completed_rx.recv() => Wake::Completed(event),
            Some(connected) = self.connected_rx.recv() => Wake::Connected(connected),
            inbound = next_inbound(self.connection.as_mut()) => Wake::Inbound(inbound),
            line = self.stdin.next_line(), if self.stdin_open => Wake::Line(line),
            () = tokio::time::sleep(TICK) => Wake::Tick,
        };

        match wake {
            Wake::Completed(event) => Ok(Some(event)),
            Wake::Connected(connected) => Ok(self.on_connected(connected)),
            Wake::Inbound(inbound) => Ok(Some(self.on_inbound(inbound))),
            Wake::Line(line) => Ok(self.on_line(line?)?),
            Wake::Tick => Ok(None),
        }
    }

    fn open_transport(&mut self) {
        self.attempt += 1;
        let attempt = self.attempt;
        let url = self.server.clone();
        let tx = self.connected_tx.clone();

        tracing::info!(%url, attempt, "connecting");
        tokio::spawn(async move {
            let result = transport::connect(&url).await;
            let _ = tx.send((attempt, result)).await;
        });
    }

    fn close_transport(&mut self, reason: &str) {
        self.attempt += 1;
        if let Some(connection) = self.connection.take() {
            tracing::info!(%reason, "closing transport");
            connection.stop();
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let connection = self.connection.as_ref().ok_or(DriverError::NotConnected)?;
        connection.send(packet).await?;
        Ok(())
    }

    fn fetch(&mut self, token: u64, request: FetchRequest) {
        let history = Arc::clone(&self.history);
        let tx = self.completed_tx.clone();

        tokio::spawn(async move {
            let result = history.execute(&request).await;
            let _ = tx.send(AppEvent::Fetched { token, result }).await;
        });
    }

    fn search_users(&mut self, query: String) {
        let history = Arc::clone(&self.history);
        let tx = self.completed_tx.clone();

        tokio::spawn(async move {
            let result = history.search_users(&query).await;
            let _ = tx.send(AppEvent::UsersFound(result)).await;
        });
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, view: &ChatView) -> Result<(), Self::Error> {
        let lines = self.printer.update(view);
        if lines.is_empty() {
            return Ok(());
        }

        let mut out = self.stdout.lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport("stopped");
    }
}
