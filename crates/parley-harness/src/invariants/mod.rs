//! Invariants checked while a simulation runs.
//!
//! After every processed event the [`Scenario`](crate::Scenario) copies the
//! observable state of each client into a [`SystemSnapshot`] and hands it to
//! an [`InvariantRegistry`]. Checks look at the snapshot only; they never
//! drive a client. Broker-side subscriptions are captured only while a
//! client has nothing left to process, so checks comparing both sides run
//! on quiet clients.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::single(ClientSnapshot::from_client(&client));
//! assert!(registry.check_all(&snapshot).is_ok());
//! ```

mod checks;
mod snapshot;

pub use checks::{
    BrokerAgreesWithRouter, PresenceSubscribedWhenLive, SingleConversationSubscription,
    StoreMatchesActiveConversation, UniqueServerIds,
};
use parley_proto::UserId;
pub use snapshot::{ClientSnapshot, SystemSnapshot};
use thiserror::Error;

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A broken invariant on one client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{invariant} (user {user}): {message}")]
pub struct Violation {
    /// Name of the broken invariant.
    pub invariant: &'static str,
    /// Client it was observed on.
    pub user: UserId,
    /// What was observed.
    pub message: String,
}

/// A property of the snapshot that must hold after every event.
pub trait Invariant: Send + Sync {
    /// Short name used in reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`; report the first client that breaks the property.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants.
#[derive(Default)]
pub struct InvariantRegistry {
    checks: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// No checks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The chat client invariants:
    ///
    /// - [`SingleConversationSubscription`]
    /// - [`StoreMatchesActiveConversation`]
    /// - [`UniqueServerIds`]
    /// - [`PresenceSubscribedWhenLive`]
    /// - [`BrokerAgreesWithRouter`]
    pub fn standard() -> Self {
        Self::new()
            .with(SingleConversationSubscription)
            .with(StoreMatchesActiveConversation)
            .with(UniqueServerIds)
            .with(PresenceSubscribedWhenLive)
            .with(BrokerAgreesWithRouter)
    }

    /// Registry with `check` appended.
    #[must_use]
    pub fn with<I: Invariant + 'static>(mut self, check: I) -> Self {
        self.add(check);
        self
    }

    /// Append `check`.
    pub fn add<I: Invariant + 'static>(&mut self, check: I) {
        self.checks.push(Box::new(check));
    }

    /// Names of the registered checks, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check. Collects all violations instead of stopping at the
    /// first.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<Violation> =
            self.checks.iter().filter_map(|c| c.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every check and fail the test on any violation. `context` names
    /// the event that was just processed.
    #[allow(clippy::panic, reason = "test harness assertion")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        let Err(violations) = self.check_all(state) else {
            return;
        };

        let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("invariants broken {context}:\n  {}", report.join("\n  "));
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
