//! REST collaborator: history, private rooms and user lookup.
//!
//! The orchestrator never performs HTTP itself. It emits
//! [`crate::ClientAction::Fetch`] with a [`FetchRequest`]; the driver runs the
//! request against a [`HistoryService`] and feeds the outcome back as
//! [`crate::ClientEvent::Fetched`].

use async_trait::async_trait;
use parley_proto::{
    ConversationId, UserId,
    payloads::{ChatMessage, UserSummary},
};
use thiserror::Error;

/// REST failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// Request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Http(String),

    /// Server answered with a non-success status.
    #[error("{url} returned {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Response body was not the expected document.
    #[error("invalid response: {0}")]
    Decode(String),
}

/// Request the orchestrator wants executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    /// History of the global room.
    GlobalHistory,
    /// Create (or fetch) the private room with `target`.
    CreatePrivateRoom {
        /// The other participant.
        target: UserId,
    },
    /// History of a private room.
    RoomHistory {
        /// Room to load.
        room: ConversationId,
    },
}

/// Successful outcome of a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Messages, oldest first.
    History(Vec<ChatMessage>),
    /// Resolved private room id.
    Room(ConversationId),
}

/// History/roster REST API.
#[async_trait]
pub trait HistoryService: Send + Sync {
    /// Messages of the global room, oldest first.
    async fn global_history(&self) -> Result<Vec<ChatMessage>, HistoryError>;

    /// Messages of a private room, oldest first.
    async fn room_history(&self, room: &ConversationId) -> Result<Vec<ChatMessage>, HistoryError>;

    /// Create the private room with `target`, or return the existing one.
    async fn create_private_room(&self, target: UserId) -> Result<ConversationId, HistoryError>;

    /// Users whose name matches `query`.
    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, HistoryError>;

    /// Execute a request emitted by the orchestrator.
    async fn execute(&self, request: &FetchRequest) -> Result<FetchResult, HistoryError> {
        match request {
            FetchRequest::GlobalHistory => self.global_history().await.map(FetchResult::History),
            FetchRequest::CreatePrivateRoom { target } => {
                self.create_private_room(*target).await.map(FetchResult::Room)
            },
            FetchRequest::RoomHistory { room } => {
                self.room_history(room).await.map(FetchResult::History)
            },
        }
    }
}
