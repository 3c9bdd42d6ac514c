//! REST request and response bodies of the history/roster API.

use serde::{Deserialize, Serialize};

use crate::{ConversationId, UserId};

/// Body of the create-or-fetch private room request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivateRoom {
    /// User the current user wants to talk to.
    pub target_user_id: UserId,
}

/// Response of the create-or-fetch private room request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateRoom {
    /// Room id, stable for a given pair of users.
    pub id: ConversationId,
}

/// One entry of a friend/user search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub username: String,
}
