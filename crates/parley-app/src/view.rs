//! Read-only view model.

use std::collections::BTreeSet;

use parley_client::{Client, Environment, SendBlocked};
use parley_core::ConnectionState;
use parley_proto::{
    UserId,
    payloads::{ChatMessage, MessageKind, MessageStatus, UserSummary},
};

/// Everything a renderer needs, copied out of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatView {
    /// Current user.
    pub me: UserId,
    /// Title of the active conversation.
    pub title: String,
    /// Connection state.
    pub connection: ConnectionState,
    /// Why the input is disabled, if it is.
    pub send_blocked: Option<SendBlocked>,
    /// Whether the chat widget is visible.
    pub widget_open: bool,
    /// Messages of the active conversation.
    pub messages: Vec<ChatMessage>,
    /// Online users.
    pub online: BTreeSet<UserId>,
    /// Result of the last user search.
    pub roster: Vec<UserSummary>,
    /// One-line status notice (errors, help).
    pub notice: Option<String>,
}

impl ChatView {
    /// Snapshot `client` plus runtime-owned state.
    pub fn build<E: Environment>(
        client: &Client<E>,
        roster: &[UserSummary],
        notice: Option<&str>,
    ) -> Self {
        Self {
            me: client.identity().user_id,
            title: client.active().title(),
            connection: client.connection_state(),
            send_blocked: client.send_blocked(),
            widget_open: client.widget_open(),
            messages: client.messages().to_vec(),
            online: client.online_users(),
            roster: roster.to_vec(),
            notice: notice.map(str::to_string),
        }
    }

    /// Status line, e.g. `[global] connected, 3 online`.
    pub fn status_line(&self) -> String {
        let connection = match self.connection {
            ConnectionState::Connected => "connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error, retrying",
        };
        let mut line = format!("[{}] {connection}, {} online", self.title, self.online.len());
        if let Some(blocked) = self.send_blocked
            && self.connection == ConnectionState::Connected
        {
            line.push_str(&format!(" ({blocked})"));
        }
        line
    }

    /// One display line for `message`.
    pub fn format_message(&self, message: &ChatMessage) -> String {
        match message.kind {
            MessageKind::Error => format!("! {}", message.content),
            MessageKind::Join => format!("* {} joined", message.sender),
            MessageKind::ReadReceipt => format!("* {} read the conversation", message.sender),
            MessageKind::Text => {
                let mut line = format!("{}: {}", message.sender, message.content);
                if message.sender_id == self.me {
                    line.push_str(match (message.server_id, message.status) {
                        (None, _) => " …",
                        (Some(_), MessageStatus::Sent) => " ✓",
                        (Some(_), MessageStatus::Read) => " ✓✓",
                    });
                }
                line
            },
        }
    }

    /// Every message formatted for display.
    pub fn lines(&self) -> Vec<String> {
        self.messages.iter().map(|m| self.format_message(m)).collect()
    }
}
