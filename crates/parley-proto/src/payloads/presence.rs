//! Presence feed bodies.

use serde::{Deserialize, Serialize};

use crate::{UserId, payloads::Payload};

/// Online state carried by a presence update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    /// User connected.
    Online,
    /// User disconnected.
    Offline,
}

/// One transition on `/topic/presence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// User whose state changed.
    pub user_id: UserId,
    /// New state.
    pub status: PresenceStatus,
}

impl PresenceUpdate {
    /// `user_id` came online.
    #[must_use]
    pub const fn online(user_id: UserId) -> Self {
        Self { user_id, status: PresenceStatus::Online }
    }

    /// `user_id` went offline.
    #[must_use]
    pub const fn offline(user_id: UserId) -> Self {
        Self { user_id, status: PresenceStatus::Offline }
    }
}

impl Payload for PresenceUpdate {}
