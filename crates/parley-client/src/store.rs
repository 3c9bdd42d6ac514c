//! In-memory message log of the active conversation.

use std::collections::HashSet;

use parley_proto::{
    UserId,
    payloads::{ChatMessage, MessageKind, MessageStatus},
};

/// Sender name of locally synthesized error entries.
pub const SYSTEM_SENDER: &str = "system";

/// Result of [`MessageStore::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Appended as a new entry.
    Appended,
    /// Replaced the optimistic copy at this index.
    Replaced(usize),
    /// Dropped, already stored under the same server id.
    Duplicate,
    /// Read receipt applied; this many entries flipped to `READ`.
    Receipt(usize),
}

/// Messages of the active conversation in arrival order.
///
/// # Invariants
///
/// - No two entries share a server id.
/// - `READ_RECEIPT` messages are never stored; they only flip statuses.
/// - Order is arrival order. History seeded after live messages arrived is
///   placed ahead of them.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries in display order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything. Called on every conversation switch.
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Append a locally-originated message for optimistic display.
    pub fn append(&mut self, local: ChatMessage) {
        self.messages.push(local);
    }

    /// Append one synthetic `ERROR` entry.
    pub fn inject_error(&mut self, text: impl Into<String>) {
        let mut message = ChatMessage::text(SYSTEM_SENDER, 0, text);
        message.kind = MessageKind::Error;
        self.messages.push(message);
    }

    /// Ingest a live message.
    ///
    /// Receipts flip statuses and are not stored. Other messages are checked
    /// for duplicates in this order:
    ///
    /// 1. same server id already stored: dropped
    /// 2. same client id as an optimistic entry: replaces it
    /// 3. no client id, and an optimistic entry has the same sender and
    ///    content: replaces it
    pub fn ingest(&mut self, message: ChatMessage) -> Ingested {
        if message.kind == MessageKind::ReadReceipt {
            return Ingested::Receipt(self.apply_receipt(&message));
        }

        if let Some(server_id) = message.server_id
            && self.messages.iter().any(|m| m.server_id == Some(server_id))
        {
            tracing::debug!(server_id, "duplicate delivery dropped");
            return Ingested::Duplicate;
        }

        if let Some(index) = self.optimistic_match(&message) {
            self.messages[index] = message;
            return Ingested::Replaced(index);
        }

        self.messages.push(message);
        Ingested::Appended
    }

    /// Insert REST history ahead of live entries. Returns the number of
    /// entries inserted.
    ///
    /// Receipt rows and messages already present by server id are skipped.
    /// A row that is the persisted copy of an optimistic entry (matched as
    /// in [`MessageStore::ingest`]) takes its place, so a late echo of the
    /// same send is then dropped as a duplicate.
    pub fn seed_history(&mut self, history: Vec<ChatMessage>) -> usize {
        let mut seen: HashSet<u64> = self.messages.iter().filter_map(|m| m.server_id).collect();
        let mut seeded = Vec::with_capacity(history.len());

        for row in history {
            if row.kind == MessageKind::ReadReceipt {
                continue;
            }
            if let Some(server_id) = row.server_id
                && !seen.insert(server_id)
            {
                continue;
            }
            if let Some(index) = self.optimistic_match(&row) {
                tracing::debug!(server_id = row.server_id, "history holds optimistic entry");
                self.messages.remove(index);
            }
            seeded.push(row);
        }
        let inserted = seeded.len();

        seeded.append(&mut self.messages);
        self.messages = seeded;
        inserted
    }

    /// Whether any message from someone other than `reader` is still unread.
    pub fn has_unread_from_others(&self, reader: UserId) -> bool {
        self.messages.iter().any(|m| is_unread_for(m, reader))
    }

    fn apply_receipt(&mut self, receipt: &ChatMessage) -> usize {
        let reader = receipt.sender_id;
        let mut flipped = 0;

        for message in &mut self.messages {
            let covered = if receipt.read_ids.is_empty() {
                is_unread_for(message, reader)
            } else {
                message.status == MessageStatus::Sent
                    && message.server_id.is_some_and(|id| receipt.read_ids.contains(&id))
            };

            if covered {
                message.status = MessageStatus::Read;
                flipped += 1;
            }
        }

        tracing::debug!(reader, flipped, "read receipt applied");
        flipped
    }

    fn optimistic_match(&self, incoming: &ChatMessage) -> Option<usize> {
        let optimistic = |m: &&ChatMessage| m.server_id.is_none() && m.kind == MessageKind::Text;

        if let Some(client_id) = &incoming.client_id {
            return self
                .messages
                .iter()
                .position(|m| optimistic(&m) && m.client_id.as_ref() == Some(client_id));
        }

        self.messages.iter().position(|m| {
            optimistic(&m) && m.sender == incoming.sender && m.content == incoming.content
        })
    }
}

fn is_unread_for(message: &ChatMessage, reader: UserId) -> bool {
    message.status == MessageStatus::Sent
        && message.sender_id != reader
        && matches!(message.kind, MessageKind::Text | MessageKind::Join)
}

#[cfg(test)]
mod tests {
    use parley_proto::ConversationId;

    use super::*;

    fn room() -> ConversationId {
        ConversationId::from("12")
    }

    #[test]
    fn echo_replaces_optimistic_copy_by_client_id() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::text("alice", 1, "hello").with_client_id("c-1"));

        let echo = ChatMessage::text("alice", 1, "hello").with_client_id("c-1").with_server_id(40);
        assert_eq!(store.ingest(echo), Ingested::Replaced(0));

        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].server_id, Some(40));
    }

    #[test]
    fn echo_without_client_id_falls_back_to_content() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::text("alice", 1, "hello").with_client_id("c-1"));

        let echo = ChatMessage::text("alice", 1, "hello").with_server_id(40);
        assert_eq!(store.ingest(echo), Ingested::Replaced(0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_client_id_is_not_merged() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::text("alice", 1, "hello").with_client_id("c-1"));

        let other = ChatMessage::text("alice", 1, "hello").with_client_id("c-2").with_server_id(41);
        assert_eq!(store.ingest(other), Ingested::Appended);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn queue_and_topic_copies_are_deduplicated() {
        let mut store = MessageStore::new();
        let msg = ChatMessage::text("sam", 7, "hi").with_server_id(5).in_conversation(room());

        assert_eq!(store.ingest(msg.clone()), Ingested::Appended);
        assert_eq!(store.ingest(msg), Ingested::Duplicate);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn receipt_without_ids_flips_counterpart_messages() {
        let mut store = MessageStore::new();
        store.ingest(ChatMessage::text("me", 1, "a").with_server_id(1));
        store.ingest(ChatMessage::text("sam", 7, "b").with_server_id(2));

        // sam read everything: only my message flips
        let receipt = ChatMessage::read_receipt("sam", 7, room());
        assert_eq!(store.ingest(receipt), Ingested::Receipt(1));

        assert_eq!(store.messages()[0].status, MessageStatus::Read);
        assert_eq!(store.messages()[1].status, MessageStatus::Sent);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn receipt_with_ids_flips_only_those() {
        let mut store = MessageStore::new();
        store.ingest(ChatMessage::text("me", 1, "a").with_server_id(1));
        store.ingest(ChatMessage::text("me", 1, "b").with_server_id(2));

        let mut receipt = ChatMessage::read_receipt("sam", 7, room());
        receipt.read_ids = vec![2];
        assert_eq!(store.ingest(receipt), Ingested::Receipt(1));

        assert_eq!(store.messages()[0].status, MessageStatus::Sent);
        assert_eq!(store.messages()[1].status, MessageStatus::Read);
    }

    #[test]
    fn history_goes_ahead_of_live_entries() {
        let mut store = MessageStore::new();
        store.ingest(ChatMessage::text("sam", 7, "live").with_server_id(3));

        let history = vec![
            ChatMessage::text("sam", 7, "old").with_server_id(1),
            ChatMessage::read_receipt("me", 1, room()),
            ChatMessage::text("me", 1, "older").with_server_id(2),
            ChatMessage::text("sam", 7, "live").with_server_id(3),
        ];
        assert_eq!(store.seed_history(history), 2);

        let contents: Vec<_> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["old", "older", "live"]);
    }

    #[test]
    fn history_before_echo_keeps_one_copy() {
        let mut store = MessageStore::new();
        let sent = ChatMessage::text("alice", 1, "hi").with_client_id("c-1");
        store.append(sent.clone());

        assert_eq!(store.seed_history(vec![sent.clone().with_server_id(5)]), 1);
        assert_eq!(store.ingest(sent.with_server_id(5)), Ingested::Duplicate);

        let rows: Vec<_> = store.messages().iter().map(|m| (m.content.as_str(), m.server_id)).collect();
        assert_eq!(rows, vec![("hi", Some(5))]);
    }

    #[test]
    fn unkeyed_history_row_matches_by_content() {
        let mut store = MessageStore::new();
        store.ingest(ChatMessage::text("sam", 7, "live").with_server_id(9));
        store.append(ChatMessage::text("alice", 1, "hi").with_client_id("c-1"));

        store.seed_history(vec![ChatMessage::text("alice", 1, "hi").with_server_id(5)]);

        let rows: Vec<_> = store.messages().iter().map(|m| (m.content.as_str(), m.server_id)).collect();
        assert_eq!(rows, vec![("hi", Some(5)), ("live", Some(9))]);
    }

    #[test]
    fn error_entry_is_synthetic() {
        let mut store = MessageStore::new();
        store.inject_error("history unavailable");

        let entry = &store.messages()[0];
        assert_eq!(entry.kind, MessageKind::Error);
        assert_eq!(entry.sender, SYSTEM_SENDER);
        assert!(entry.server_id.is_none());
    }

    #[test]
    fn unread_ignores_own_and_error_entries() {
        let mut store = MessageStore::new();
        store.append(ChatMessage::text("me", 1, "mine"));
        store.inject_error("oops");
        assert!(!store.has_unread_from_others(1));

        store.ingest(ChatMessage::text("sam", 7, "yours").with_server_id(9));
        assert!(store.has_unread_from_others(1));
    }
}
