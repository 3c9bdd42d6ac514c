//! HTTP implementation of [`HistoryService`].

use async_trait::async_trait;
use parley_proto::{
    ConversationId, UserId,
    payloads::{ChatMessage, CreatePrivateRoom, PrivateRoom, UserSummary},
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::history::{HistoryError, HistoryService};

/// REST client for the history/roster API rooted at `base`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base: String,
}

impl RestClient {
    /// Client for the API at `base` (e.g. `http://localhost:8080/api`).
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base)
    }

    /// Client reusing an existing `reqwest` client.
    pub fn with_client(http: Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { http, base }
    }

    /// API root.
    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T, HistoryError> {
        let response =
            self.http.get(&url).send().await.map_err(|e| HistoryError::Http(e.to_string()))?;
        decode(url, response).await
    }
}

async fn decode<T: DeserializeOwned>(url: String, response: Response) -> Result<T, HistoryError> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%url, %status, "history API error");
        return Err(HistoryError::Status { status: status.as_u16(), url });
    }

    response.json::<T>().await.map_err(|e| HistoryError::Decode(e.to_string()))
}

#[async_trait]
impl HistoryService for RestClient {
    async fn global_history(&self) -> Result<Vec<ChatMessage>, HistoryError> {
        self.get(self.url("/messages/public")).await
    }

    async fn room_history(&self, room: &ConversationId) -> Result<Vec<ChatMessage>, HistoryError> {
        self.get(self.url(&format!("/conversations/{room}/messages"))).await
    }

    async fn create_private_room(&self, target: UserId) -> Result<ConversationId, HistoryError> {
        let url = self.url("/conversations/private");
        let response = self
            .http
            .post(&url)
            .json(&CreatePrivateRoom { target_user_id: target })
            .send()
            .await
            .map_err(|e| HistoryError::Http(e.to_string()))?;

        let room: PrivateRoom = decode(url, response).await?;
        Ok(room.id)
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, HistoryError> {
        let url = self.url("/users/search");
        let response = self
            .http
            .get(&url)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| HistoryError::Http(e.to_string()))?;

        decode(url, response).await
    }
}
