//! Read receipt emission.

use parley_proto::{UserId, payloads::MarkRead};

use crate::conversation::Conversation;

/// What happened that may warrant a read receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptTrigger {
    /// The window regained focus.
    FocusRegained,
    /// History of the conversation was just seeded.
    Opened {
        /// Whether unread messages from the counterpart are present.
        unread: bool,
    },
    /// A new message from the counterpart arrived.
    CounterpartMessage,
}

/// View of the orchestrator state the coordinator decides on.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptContext<'a> {
    /// Active conversation.
    pub conversation: &'a Conversation,
    /// Whether the chat widget is open.
    pub widget_open: bool,
    /// Whether the window has focus.
    pub focused: bool,
    /// Current user.
    pub reader: UserId,
}

/// Decides when to tell the broker that the current user has read a private
/// room.
///
/// Receipts are fire-and-forget and not deduplicated; the server treats
/// repeated marks as idempotent.
#[derive(Debug, Clone, Default)]
pub struct ReadReceiptCoordinator {
    sent: u64,
}

impl ReadReceiptCoordinator {
    /// New coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of receipts emitted so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Returns the receipt to publish, if `trigger` warrants one in `ctx`.
    ///
    /// Requires a private conversation with a known room id and an open
    /// widget. Then fires on focus regained, on open with unread messages,
    /// or on a counterpart message while focused.
    pub fn maybe_send_receipt(
        &mut self,
        ctx: ReceiptContext<'_>,
        trigger: ReceiptTrigger,
    ) -> Option<MarkRead> {
        let room = ctx.conversation.room()?;
        if !ctx.widget_open {
            return None;
        }

        let fire = match trigger {
            ReceiptTrigger::FocusRegained => true,
            ReceiptTrigger::Opened { unread } => unread,
            ReceiptTrigger::CounterpartMessage => ctx.focused,
        };
        if !fire {
            return None;
        }

        self.sent += 1;
        tracing::debug!(room = %room, ?trigger, "marking conversation read");
        Some(MarkRead { conversation_id: room.clone(), reader_id: ctx.reader })
    }
}
