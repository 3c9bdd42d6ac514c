//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use parley_client::FetchRequest;
use parley_proto::Packet;

use crate::{AppEvent, ChatView};

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal client and simulation.
///
/// Long-running work (opening the socket, REST calls) must not block: the
/// driver starts it and reports the outcome later through
/// [`Driver::poll_event`].
///
/// # Implementations
///
/// - **CLI**: stdin lines, tokio-tungstenite WebSocket, reqwest REST client
/// - **Simulation**: scripted events, in-memory broker, virtual clock
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait for the next event.
    ///
    /// Returns `None` when nothing happened within the driver's tick
    /// interval; the runtime then ticks the client.
    fn poll_event(&mut self) -> impl Future<Output = Result<Option<AppEvent>, Self::Error>> + Send;

    /// Start opening the transport to the broker.
    ///
    /// Completion is reported as [`AppEvent::TransportOpened`] or
    /// [`AppEvent::TransportFailed`].
    fn open_transport(&mut self);

    /// Close the transport. No `TransportClosed` event needs to follow.
    fn close_transport(&mut self, reason: &str);

    /// Send a packet to the broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport is closed or send fails.
    fn send_packet(&mut self, packet: Packet) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Start a REST request. The outcome is reported as
    /// [`AppEvent::Fetched`] carrying `token`.
    fn fetch(&mut self, token: u64, request: FetchRequest);

    /// Start a user search. The outcome is reported as
    /// [`AppEvent::UsersFound`].
    fn search_users(&mut self, query: String);

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, view: &ChatView) -> Result<(), Self::Error>;

    /// Stop the transport and clean up resources.
    fn stop(&mut self);
}
