//! Scriptable REST collaborator backed by the simulated broker.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use parley_client::{FetchRequest, FetchResult, HistoryError, HistoryService};
use parley_proto::{
    ConversationId, UserId,
    payloads::{ChatMessage, UserSummary},
};

use crate::{sim_broker::SharedBroker, sim_env::lock};

/// History API for one signed-in user.
///
/// Reads the broker's histories directly, so anything published before a
/// fetch completes is part of its result. Failures can be queued with
/// [`SimHistory::fail_next`].
#[derive(Debug, Clone)]
pub struct SimHistory {
    broker: SharedBroker,
    me: UserId,
    failures: Arc<Mutex<VecDeque<HistoryError>>>,
}

impl SimHistory {
    /// History API acting on behalf of `me`.
    pub fn new(broker: SharedBroker, me: UserId) -> Self {
        Self { broker, me, failures: Arc::new(Mutex::new(VecDeque::new())) }
    }

    /// Fail the next request with `error`. Queued failures are consumed in
    /// order, one per request.
    pub fn fail_next(&self, error: HistoryError) {
        lock(&self.failures).push_back(error);
    }

    /// Execute `request` synchronously.
    pub fn resolve(&self, request: &FetchRequest) -> Result<FetchResult, HistoryError> {
        match request {
            FetchRequest::GlobalHistory => self.global().map(FetchResult::History),
            FetchRequest::CreatePrivateRoom { target } => {
                self.private_room(*target).map(FetchResult::Room)
            },
            FetchRequest::RoomHistory { room } => self.room(room).map(FetchResult::History),
        }
    }

    /// Search users synchronously.
    pub fn search(&self, query: &str) -> Result<Vec<UserSummary>, HistoryError> {
        self.injected_failure()?;
        Ok(lock(&self.broker).search_users(query))
    }

    fn global(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        self.injected_failure()?;
        Ok(lock(&self.broker).public_history().to_vec())
    }

    fn room(&self, room: &ConversationId) -> Result<Vec<ChatMessage>, HistoryError> {
        self.injected_failure()?;
        lock(&self.broker).room_history(room).map(<[ChatMessage]>::to_vec).ok_or_else(|| {
            HistoryError::Status { status: 404, url: format!("/conversations/{room}/messages") }
        })
    }

    fn private_room(&self, target: UserId) -> Result<ConversationId, HistoryError> {
        self.injected_failure()?;
        if target == self.me {
            return Err(HistoryError::Status {
                status: 400,
                url: "/conversations/private".to_string(),
            });
        }
        Ok(lock(&self.broker).create_private_room(self.me, target))
    }

    fn injected_failure(&self) -> Result<(), HistoryError> {
        match lock(&self.failures).pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HistoryService for SimHistory {
    async fn global_history(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        self.global()
    }

    async fn room_history(&self, room: &ConversationId) -> Result<Vec<ChatMessage>, HistoryError> {
        self.room(room)
    }

    async fn create_private_room(&self, target: UserId) -> Result<ConversationId, HistoryError> {
        self.private_room(target)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, HistoryError> {
        self.search(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimBroker;

    #[test]
    fn queued_failure_is_consumed_once() {
        let history = SimHistory::new(SimBroker::new().shared(), 1);
        history.fail_next(HistoryError::Http("boom".into()));

        assert_eq!(
            history.resolve(&FetchRequest::GlobalHistory),
            Err(HistoryError::Http("boom".into()))
        );
        assert_eq!(history.resolve(&FetchRequest::GlobalHistory), Ok(FetchResult::History(vec![])));
    }

    #[test]
    fn unknown_room_is_not_found() {
        let history = SimHistory::new(SimBroker::new().shared(), 1);
        let result = history.resolve(&FetchRequest::RoomHistory { room: "nope".into() });

        assert!(matches!(result, Err(HistoryError::Status { status: 404, .. })));
    }

    #[test]
    fn cannot_open_a_room_with_yourself() {
        let history = SimHistory::new(SimBroker::new().shared(), 1);
        let result = history.resolve(&FetchRequest::CreatePrivateRoom { target: 1 });

        assert!(matches!(result, Err(HistoryError::Status { status: 400, .. })));
    }
}
