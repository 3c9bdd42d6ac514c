//! Multi-client scenarios on one simulated broker.
//!
//! A [`Scenario`] owns the virtual clock, the broker and any number of
//! clients, each running the production [`Runtime`] on a [`SimDriver`].
//! Events are processed one at a time, round robin across clients, until
//! nothing is left to do. The standard invariants are checked after every
//! processed event.
//!
//! ```ignore
//! let mut sim = Scenario::new(7);
//! let alice = sim.add_client(1, "alice").await?;
//! sim.intent(alice, UserIntent::Send("hi".into())).await?;
//! assert_eq!(sim.client(alice).messages().len(), 1);
//! ```

use std::{sync::MutexGuard, time::Duration};

use parley_app::{ChatView, Driver, Runtime, UserIntent};
use parley_client::{Client, ConnectionConfig, Identity};
use parley_proto::{UserId, payloads::ChatMessage};

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_broker::{SharedBroker, SimBroker},
    sim_driver::{SimDriver, SimDriverError},
    sim_env::{SimEnv, lock},
    sim_history::SimHistory,
};

/// Events processed before a scenario is declared stuck.
const MAX_STEPS: usize = 10_000;

/// Clock granularity of [`Scenario::advance`].
const TICK: Duration = Duration::from_secs(1);

/// One simulated user.
pub struct SimClient {
    runtime: Runtime<SimDriver, SimEnv>,
    quit: bool,
}

impl SimClient {
    /// Client state machine.
    pub fn client(&self) -> &Client<SimEnv> {
        self.runtime.client()
    }

    /// Messages of the active conversation.
    pub fn messages(&self) -> &[ChatMessage] {
        self.runtime.client().messages()
    }

    /// Driver, for inspection.
    pub fn driver(&self) -> &SimDriver {
        self.runtime.driver()
    }

    /// Driver, for fault injection.
    pub fn driver_mut(&mut self) -> &mut SimDriver {
        self.runtime.driver_mut()
    }

    /// Current view.
    pub fn view(&self) -> ChatView {
        self.runtime.view()
    }

    /// Whether the user quit.
    pub fn has_quit(&self) -> bool {
        self.quit
    }

    fn snapshot(&self, broker: &SimBroker, quiet: bool) -> ClientSnapshot {
        let snapshot = ClientSnapshot::from_client(self.client());
        match self.driver().session() {
            Some(session) if quiet => {
                snapshot.with_broker_subscriptions(broker.subscriptions(session))
            },
            _ => snapshot,
        }
    }
}

/// Deterministic multi-client simulation.
pub struct Scenario {
    env: SimEnv,
    broker: SharedBroker,
    clients: Vec<SimClient>,
    invariants: InvariantRegistry,
    config: ConnectionConfig,
    broker_heartbeats: bool,
}

impl Scenario {
    /// Empty scenario with RNG seeded from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            broker: SimBroker::new().shared(),
            clients: Vec::new(),
            invariants: InvariantRegistry::standard(),
            config: ConnectionConfig::default(),
            broker_heartbeats: true,
        }
    }

    /// Connection settings for clients added afterwards.
    #[must_use]
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the invariant registry.
    #[must_use]
    pub fn with_invariants(mut self, invariants: InvariantRegistry) -> Self {
        self.invariants = invariants;
        self
    }

    /// Shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Lock the broker.
    pub fn broker(&self) -> MutexGuard<'_, SimBroker> {
        lock(&self.broker)
    }

    /// Stop or resume broker heart-beats during [`Scenario::advance`].
    pub fn set_broker_heartbeats(&mut self, enabled: bool) {
        self.broker_heartbeats = enabled;
    }

    /// Client at `index`.
    pub fn client(&self, index: usize) -> &SimClient {
        &self.clients[index]
    }

    /// Client at `index`, mutably.
    pub fn client_mut(&mut self, index: usize) -> &mut SimClient {
        &mut self.clients[index]
    }

    /// Sign in `user_id` and let it connect. Returns the client index.
    pub async fn add_client(&mut self, user_id: UserId, username: &str) -> Result<usize, SimDriverError> {
        self.broker().register_user(user_id, username);

        let history = SimHistory::new(self.broker.clone(), user_id);
        let driver = SimDriver::new(self.env.clone(), self.broker.clone(), history);
        let config = ConnectionConfig { login: Some(user_id.to_string()), ..self.config.clone() };
        let client = Client::new(self.env.clone(), Identity::new(user_id, username), config);

        let mut runtime = Runtime::new(driver, client);
        runtime.start().await?;
        self.clients.push(SimClient { runtime, quit: false });
        self.settle().await?;
        Ok(self.clients.len() - 1)
    }

    /// Feed user input to client `index` and settle.
    pub async fn intent(&mut self, index: usize, intent: UserIntent) -> Result<(), SimDriverError> {
        self.clients[index].driver_mut().inject_intent(intent);
        self.settle().await
    }

    /// Process events until every client is idle.
    pub async fn settle(&mut self) -> Result<(), SimDriverError> {
        for _ in 0..MAX_STEPS {
            let mut progressed = false;
            for index in 0..self.clients.len() {
                progressed |= self.step(index).await?;
            }
            if !progressed {
                return Ok(());
            }
        }
        Err(SimDriverError::Unsettled(MAX_STEPS))
    }

    /// Move the clock forward in one-second steps, ticking every client and
    /// settling after each step.
    pub async fn advance(&mut self, by: Duration) -> Result<(), SimDriverError> {
        let mut remaining = by;
        while !remaining.is_zero() {
            let step = remaining.min(TICK);
            remaining -= step;
            self.env.advance(step);

            if self.broker_heartbeats {
                self.broker().heartbeat_all();
            }
            for sim in self.clients.iter_mut().filter(|c| !c.quit) {
                sim.runtime.tick().await?;
            }
            self.settle().await?;
        }
        Ok(())
    }

    /// Snapshot of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        let quiet: Vec<bool> = self.clients.iter().map(|c| !c.driver().has_pending()).collect();
        let broker = self.broker();
        SystemSnapshot::from_clients(
            self.clients.iter().zip(quiet).map(|(c, quiet)| c.snapshot(&broker, quiet)).collect(),
        )
    }

    /// Assert the registered invariants.
    pub fn check_invariants(&self, context: &str) {
        self.invariants.assert_all(&self.snapshot(), context);
    }

    /// Process one pending event of client `index`. Returns `false` if it was
    /// idle or has quit.
    pub async fn step(&mut self, index: usize) -> Result<bool, SimDriverError> {
        let sim = &mut self.clients[index];
        if sim.quit {
            return Ok(false);
        }
        let Some(event) = sim.runtime.driver_mut().poll_event().await? else {
            return Ok(false);
        };

        let context = format!("after {event:?} on client {index}");
        if sim.runtime.step(event).await? {
            sim.runtime.shutdown().await?;
            sim.quit = true;
        }

        self.check_invariants(&context);
        Ok(true)
    }
}
