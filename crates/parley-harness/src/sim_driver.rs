//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`parley_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! The transport is a session on the shared [`SimBroker`](crate::SimBroker);
//! REST requests go to a [`SimHistory`]. Fetches complete immediately by
//! default. With [`SimDriver::hold_fetches`] they are parked until the test
//! completes them, in any order.

use std::collections::VecDeque;

use parley_app::{AppEvent, ChatView, Driver, UserIntent};
use parley_client::FetchRequest;
use parley_core::Environment;
use parley_proto::{Command, Frame, Packet};
use thiserror::Error;

use crate::{
    sim_broker::{SessionId, SharedBroker},
    sim_env::{SimEnv, SimInstant, lock},
    sim_history::SimHistory,
};

/// Error type for simulation driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimDriverError {
    /// Packet sent while no transport is open.
    #[error("transport not open")]
    NotConnected,

    /// Events kept flowing past the step limit.
    #[error("simulation did not settle after {0} steps")]
    Unsettled(usize),
}

/// REST request parked by [`SimDriver::hold_fetches`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    /// Switch token the client attached.
    pub token: u64,
    /// The request.
    pub request: FetchRequest,
}

/// Simulation driver for deterministic testing.
pub struct SimDriver {
    env: SimEnv,
    broker: SharedBroker,
    history: SimHistory,
    /// Broker session of the open transport.
    session: Option<SessionId>,
    events: VecDeque<AppEvent>,
    sent: Vec<Packet>,
    hold_fetches: bool,
    fetches: Vec<PendingFetch>,
    refuse_next_open: Option<String>,
    last_view: Option<ChatView>,
    renders: usize,
    stopped: bool,
}

impl SimDriver {
    /// Driver on `broker`, answering REST requests through `history`.
    pub fn new(env: SimEnv, broker: SharedBroker, history: SimHistory) -> Self {
        Self {
            env,
            broker,
            history,
            session: None,
            events: VecDeque::new(),
            sent: Vec::new(),
            hold_fetches: false,
            fetches: Vec::new(),
            refuse_next_open: None,
            last_view: None,
            renders: 0,
            stopped: false,
        }
    }

    /// Inject an `AppEvent` for processing.
    pub fn inject_event(&mut self, event: AppEvent) {
        self.events.push_back(event);
    }

    /// Inject user input.
    pub fn inject_intent(&mut self, intent: UserIntent) {
        self.events.push_back(AppEvent::User(intent));
    }

    /// Whether anything is waiting to be polled.
    pub fn has_pending(&self) -> bool {
        !self.events.is_empty()
            || self.session.is_some_and(|session| lock(&self.broker).has_outbound(session))
    }

    /// Broker session of the open transport.
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// REST collaborator, for failure injection.
    pub fn history(&self) -> &SimHistory {
        &self.history
    }

    /// Simulate the network dropping the transport.
    pub fn drop_connection(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            lock(&self.broker).close_session(session);
            self.events.push_back(AppEvent::TransportClosed { reason: reason.to_string() });
        }
    }

    /// Make the next `open_transport` fail with `reason`.
    pub fn refuse_next_open(&mut self, reason: &str) {
        self.refuse_next_open = Some(reason.to_string());
    }

    /// Park fetches until completed explicitly.
    pub fn hold_fetches(&mut self, hold: bool) {
        self.hold_fetches = hold;
    }

    /// Parked fetches, oldest first.
    pub fn pending_fetches(&self) -> &[PendingFetch] {
        &self.fetches
    }

    /// Complete the parked fetch at `index`. Returns `false` if there is none.
    pub fn complete_fetch(&mut self, index: usize) -> bool {
        if index >= self.fetches.len() {
            return false;
        }
        let fetch = self.fetches.remove(index);
        self.resolve(fetch);
        true
    }

    /// Complete every parked fetch, newest first.
    pub fn complete_fetches_reversed(&mut self) {
        while let Some(fetch) = self.fetches.pop() {
            self.resolve(fetch);
        }
    }

    /// Every packet sent so far.
    pub fn sent(&self) -> &[Packet] {
        &self.sent
    }

    /// Take the packets sent so far.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }

    /// Sent frames with `command`.
    pub fn sent_frames(&self, command: Command) -> Vec<&Frame> {
        self.sent
            .iter()
            .filter_map(|packet| match packet {
                Packet::Frame(frame) if frame.command == command => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// Last rendered view.
    pub fn last_view(&self) -> Option<&ChatView> {
        self.last_view.as_ref()
    }

    /// Number of renders.
    pub fn renders(&self) -> usize {
        self.renders
    }

    /// Whether `stop` was called.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn resolve(&mut self, fetch: PendingFetch) {
        let result = self.history.resolve(&fetch.request);
        self.events.push_back(AppEvent::Fetched { token: fetch.token, result });
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }

        let Some(session) = self.session else {
            return Ok(None);
        };
        Ok(lock(&self.broker).pop_outbound(session).map(AppEvent::Packet))
    }

    fn open_transport(&mut self) {
        if let Some(reason) = self.refuse_next_open.take() {
            self.events.push_back(AppEvent::TransportFailed { reason });
            return;
        }

        let opened = lock(&self.broker).open_session();
        match opened {
            Some(session) => {
                self.session = Some(session);
                self.events.push_back(AppEvent::TransportOpened);
            },
            None => self
                .events
                .push_back(AppEvent::TransportFailed { reason: "connection refused".to_string() }),
        }
    }

    fn close_transport(&mut self, reason: &str) {
        if let Some(session) = self.session.take() {
            tracing::debug!(session, %reason, "closing transport");
            lock(&self.broker).close_session(session);
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let session = self.session.ok_or(SimDriverError::NotConnected)?;
        lock(&self.broker).receive(session, &packet);
        self.sent.push(packet);
        Ok(())
    }

    fn fetch(&mut self, token: u64, request: FetchRequest) {
        let fetch = PendingFetch { token, request };
        if self.hold_fetches {
            self.fetches.push(fetch);
        } else {
            self.resolve(fetch);
        }
    }

    fn search_users(&mut self, query: String) {
        let result = self.history.search(&query);
        self.events.push_back(AppEvent::UsersFound(result));
    }

    fn now(&self) -> Self::Instant {
        self.env.now()
    }

    fn render(&mut self, view: &ChatView) -> Result<(), Self::Error> {
        self.last_view = Some(view.clone());
        self.renders += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport("stopped");
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimBroker;

    fn driver() -> SimDriver {
        let broker = SimBroker::new().shared();
        let history = SimHistory::new(broker.clone(), 1);
        SimDriver::new(SimEnv::default(), broker, history)
    }

    #[test]
    fn inject_event_queues_event() {
        let mut driver = driver();
        driver.inject_intent(UserIntent::OpenGlobal);

        assert!(driver.has_pending());
    }

    #[tokio::test]
    async fn open_transport_reports_outcome() {
        let mut driver = driver();
        driver.refuse_next_open("offline");
        driver.open_transport();
        driver.open_transport();

        let first = driver.poll_event().await.unwrap();
        let second = driver.poll_event().await.unwrap();

        assert!(matches!(first, Some(AppEvent::TransportFailed { reason }) if reason == "offline"));
        assert!(matches!(second, Some(AppEvent::TransportOpened)));
        assert!(driver.session().is_some());
    }

    #[tokio::test]
    async fn send_without_transport_fails() {
        let mut driver = driver();
        let result = driver.send_packet(Packet::Heartbeat).await;

        assert_eq!(result, Err(SimDriverError::NotConnected));
    }

    #[tokio::test]
    async fn held_fetches_complete_in_any_order() {
        let mut driver = driver();
        driver.hold_fetches(true);
        driver.fetch(1, FetchRequest::GlobalHistory);
        driver.fetch(2, FetchRequest::GlobalHistory);
        assert!(!driver.has_pending());

        driver.complete_fetches_reversed();

        let tokens: Vec<u64> = [driver.poll_event().await, driver.poll_event().await]
            .into_iter()
            .filter_map(|event| match event {
                Ok(Some(AppEvent::Fetched { token, .. })) => Some(token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec![2, 1]);
    }
}
