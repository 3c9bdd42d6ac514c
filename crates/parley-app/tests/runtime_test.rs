//! Integration tests for Runtime orchestration.
//!
//! A scripted driver records every call the runtime makes. Tests feed
//! events through [`Runtime::step`] and check what reached the driver.

use std::{
    collections::VecDeque,
    convert::Infallible,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use parley_app::{AppEvent, ChatView, Driver, HELP, Runtime, UserIntent};
use parley_client::{
    Client, ConnectionConfig, Environment, FetchRequest, FetchResult, Identity, SendBlocked,
};
use parley_proto::{Packet, payloads::UserSummary};

#[derive(Clone, Default)]
struct CountingEnv(Arc<AtomicU64>);

impl Environment for CountingEnv {
    type Instant = Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        let n = self.0.fetch_add(1, Ordering::Relaxed).to_be_bytes();
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = n[i % n.len()];
        }
    }
}

#[derive(Default)]
struct ScriptedDriver {
    events: VecDeque<AppEvent>,
    opened: usize,
    sent: Vec<Packet>,
    fetches: Vec<(u64, FetchRequest)>,
    searches: Vec<String>,
    views: Vec<ChatView>,
    stopped: bool,
}

impl Driver for ScriptedDriver {
    type Error = Infallible;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent>, Self::Error> {
        Ok(self.events.pop_front())
    }

    fn open_transport(&mut self) {
        self.opened += 1;
    }

    fn close_transport(&mut self, _reason: &str) {}

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        self.sent.push(packet);
        Ok(())
    }

    fn fetch(&mut self, token: u64, request: FetchRequest) {
        self.fetches.push((token, request));
    }

    fn search_users(&mut self, query: String) {
        self.searches.push(query);
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn render(&mut self, view: &ChatView) -> Result<(), Self::Error> {
        self.views.push(view.clone());
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

async fn started() -> Runtime<ScriptedDriver, CountingEnv> {
    let client = Client::new(CountingEnv::default(), Identity::new(1, "alice"), ConnectionConfig::default());
    let mut runtime = Runtime::new(ScriptedDriver::default(), client);
    runtime.start().await.unwrap();
    runtime
}

async fn intent(runtime: &mut Runtime<ScriptedDriver, CountingEnv>, intent: UserIntent) -> bool {
    runtime.step(AppEvent::User(intent)).await.unwrap()
}

#[tokio::test]
async fn start_connects_and_loads_global_history() {
    let runtime = started().await;
    let driver = runtime.driver();

    assert_eq!(driver.opened, 1);
    assert_eq!(driver.fetches.len(), 1);
    assert_eq!(driver.fetches[0].1, FetchRequest::GlobalHistory);
    assert!(driver.sent.is_empty());
    assert_eq!(driver.views.last().map(|v| v.title.as_str()), Some("global"));
}

#[tokio::test]
async fn send_while_disconnected_becomes_notice() {
    let mut runtime = started().await;

    let quit = intent(&mut runtime, UserIntent::Send("hello".into())).await;

    assert!(!quit);
    assert!(runtime.driver().sent.is_empty());
    let view = runtime.view();
    assert_eq!(view.send_blocked, Some(SendBlocked::Disconnected));
    assert!(view.notice.is_some());
    assert!(view.messages.is_empty());
}

#[tokio::test]
async fn unknown_name_is_not_opened() {
    let mut runtime = started().await;

    intent(&mut runtime, UserIntent::Open { target: "nobody".into() }).await;

    assert_eq!(runtime.driver().fetches.len(), 1);
    assert_eq!(runtime.view().notice.as_deref(), Some("unknown user nobody, try /find"));
}

#[tokio::test]
async fn search_result_resolves_names() {
    let mut runtime = started().await;

    intent(&mut runtime, UserIntent::Search { query: "sa".into() }).await;
    assert_eq!(runtime.driver().searches, vec!["sa"]);

    let found = vec![UserSummary { id: 7, username: "Sam".into() }];
    runtime.step(AppEvent::UsersFound(Ok(found))).await.unwrap();
    assert_eq!(runtime.view().roster.len(), 1);

    intent(&mut runtime, UserIntent::Open { target: "sam".into() }).await;

    let (_, request) = runtime.driver().fetches.last().cloned().unwrap();
    assert_eq!(request, FetchRequest::CreatePrivateRoom { target: 7 });
    assert_eq!(runtime.view().title, "@Sam");
}

#[tokio::test]
async fn stale_fetch_is_ignored() {
    let mut runtime = started().await;
    let (stale, _) = runtime.driver().fetches[0].clone();

    intent(&mut runtime, UserIntent::Open { target: "7".into() }).await;
    runtime.step(AppEvent::Fetched { token: stale, result: Ok(FetchResult::History(Vec::new())) })
        .await
        .unwrap();

    assert!(!runtime.client().active().is_global());
    assert_eq!(runtime.driver().fetches.len(), 2);
}

#[tokio::test]
async fn help_and_quit() {
    let mut runtime = started().await;

    assert!(!intent(&mut runtime, UserIntent::Help).await);
    assert_eq!(runtime.view().notice.as_deref(), Some(HELP));

    assert!(intent(&mut runtime, UserIntent::Quit).await);
    runtime.shutdown().await.unwrap();
    assert!(runtime.driver().stopped);
}

#[tokio::test]
async fn run_drains_events_until_quit() {
    let client = Client::new(CountingEnv::default(), Identity::new(1, "alice"), ConnectionConfig::default());
    let mut driver = ScriptedDriver::default();
    driver.events.push_back(AppEvent::User(UserIntent::Help));
    driver.events.push_back(AppEvent::User(UserIntent::Quit));

    Runtime::new(driver, client).run().await.unwrap();
}
