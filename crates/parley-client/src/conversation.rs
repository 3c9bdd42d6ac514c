//! Active conversation and identity types.

use parley_proto::{ConversationId, UserId};
use serde::{Deserialize, Serialize};

/// The signed-in user, as read from the local session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub user_id: UserId,
    /// Display name attached to outgoing messages.
    pub username: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self { user_id, username: username.into() }
    }
}

/// Another user the current user can talk to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Friend {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

impl Friend {
    /// Create a friend entry.
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self { id, username: username.into() }
    }
}

/// Conversation currently shown.
///
/// Replaced wholesale on every switch, including when the room id of a
/// private conversation resolves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Conversation {
    /// Global broadcast room.
    #[default]
    Global,
    /// Private room with one other user.
    Private {
        /// The other participant.
        counterpart: Friend,
        /// Room id. `None` until create-or-fetch completes.
        room: Option<ConversationId>,
    },
}

impl Conversation {
    /// Whether this is the global room.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }

    /// Private room id, if private and resolved.
    pub fn room(&self) -> Option<&ConversationId> {
        match self {
            Self::Private { room, .. } => room.as_ref(),
            Self::Global => None,
        }
    }

    /// The other participant of a private conversation.
    pub fn counterpart(&self) -> Option<&Friend> {
        match self {
            Self::Private { counterpart, .. } => Some(counterpart),
            Self::Global => None,
        }
    }

    /// Global, or private with a known room id.
    pub fn is_resolved(&self) -> bool {
        self.is_global() || self.room().is_some()
    }

    /// Human-readable title.
    pub fn title(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Private { counterpart, .. } => format!("@{}", counterpart.username),
        }
    }
}
