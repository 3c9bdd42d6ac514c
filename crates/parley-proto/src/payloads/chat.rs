//! Chat message bodies.

use serde::{Deserialize, Serialize};

use crate::{ConversationId, UserId, payloads::Payload};

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// User-authored text.
    Text,
    /// A user joined the room.
    Join,
    /// The reader has seen messages in a private room.
    ReadReceipt,
    /// Locally synthesized error notice; never sent by the broker.
    Error,
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Published, not yet read by the recipient.
    #[default]
    Sent,
    /// Recipient has read the message.
    Read,
}

/// Chat message as it appears on the wire and in REST history.
///
/// `server_id` is absent on client-originated messages and present on
/// broker-delivered ones. `client_id` is the per-send idempotency key the
/// client attaches so the broker echo can be matched to the optimistic copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Broker-assigned message id.
    #[serde(rename = "id", alias = "serverId", default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u64>,
    /// Client-assigned idempotency key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Display name of the author.
    pub sender: String,
    /// User id of the author.
    pub sender_id: UserId,
    /// Message text. Empty for receipts and joins.
    #[serde(default)]
    pub content: String,
    /// Message kind.
    #[serde(alias = "type")]
    pub kind: MessageKind,
    /// Delivery status.
    #[serde(default)]
    pub status: MessageStatus,
    /// Private room id. Absent for the global room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Message ids covered by a read receipt. Empty means "everything so far".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_ids: Vec<u64>,
}

impl ChatMessage {
    /// Text message authored by `sender_id`.
    pub fn text(sender: impl Into<String>, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            server_id: None,
            client_id: None,
            sender: sender.into(),
            sender_id,
            content: content.into(),
            kind: MessageKind::Text,
            status: MessageStatus::Sent,
            conversation_id: None,
            read_ids: Vec::new(),
        }
    }

    /// Read receipt issued by `reader_id`.
    pub fn read_receipt(
        reader: impl Into<String>,
        reader_id: UserId,
        conversation_id: ConversationId,
    ) -> Self {
        Self {
            kind: MessageKind::ReadReceipt,
            conversation_id: Some(conversation_id),
            ..Self::text(reader, reader_id, "")
        }
    }

    /// Attach the broker-assigned id.
    #[must_use]
    pub fn with_server_id(mut self, id: u64) -> Self {
        self.server_id = Some(id);
        self
    }

    /// Attach the client idempotency key.
    #[must_use]
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Scope the message to a private room.
    #[must_use]
    pub fn in_conversation(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

impl Payload for ChatMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_send_body_shape() {
        let msg = ChatMessage::text("alice", 1, "hello").with_client_id("c-1");
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "clientId": "c-1",
                "sender": "alice",
                "senderId": 1,
                "content": "hello",
                "kind": "TEXT",
                "status": "SENT",
            })
        );
    }

    #[test]
    fn accepts_server_field_spellings() {
        let json = r#"{"id":9,"sender":"sam","senderId":7,"content":"hi","type":"TEXT",
                       "conversationId":12}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.server_id, Some(9));
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.conversation_id, Some(ConversationId::from("12")));
    }

    #[test]
    fn receipt_without_content_parses() {
        let json = r#"{"sender":"sam","senderId":7,"kind":"READ_RECEIPT","readIds":[1,2]}"#;
        let msg: ChatMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.kind, MessageKind::ReadReceipt);
        assert!(msg.content.is_empty());
        assert_eq!(msg.read_ids, vec![1, 2]);
    }
}
