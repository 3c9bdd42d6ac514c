//! Outbound read receipt body.

use serde::{Deserialize, Serialize};

use crate::{ConversationId, UserId, payloads::Payload};

/// Body of `SEND /app/mark-read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRead {
    /// Room whose messages were read.
    pub conversation_id: ConversationId,
    /// User who read them.
    pub reader_id: UserId,
}

impl Payload for MarkRead {}
