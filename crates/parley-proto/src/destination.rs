//! Typed STOMP destinations.

use std::{fmt, str::FromStr};

use crate::{ConversationId, errors::ProtocolError};

const PUBLIC_TOPIC: &str = "/topic/public";
const PRESENCE_TOPIC: &str = "/topic/presence";
const CONVERSATION_TOPIC_PREFIX: &str = "/topic/conversation.";
const CONVERSATION_QUEUE_PREFIX: &str = "/queue/conversation.";
const SEND_PUBLIC: &str = "/app/sendMessage";
const SEND_PRIVATE: &str = "/app/private-message";
const MARK_READ: &str = "/app/mark-read";

/// Every destination the client subscribes or publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Global broadcast room.
    PublicTopic,
    /// Online/offline transitions for all users.
    PresenceTopic,
    /// Broadcast channel of one private room.
    ConversationTopic(ConversationId),
    /// Point-to-point delivery for one private room.
    ConversationQueue(ConversationId),
    /// Publish into the global room.
    SendPublic,
    /// Publish into a private room (body carries `conversationId`).
    SendPrivate,
    /// Publish a read receipt.
    MarkRead,
}

impl Destination {
    /// Whether clients may `SUBSCRIBE` to this destination.
    #[must_use]
    pub fn is_subscribable(&self) -> bool {
        matches!(
            self,
            Self::PublicTopic
                | Self::PresenceTopic
                | Self::ConversationTopic(_)
                | Self::ConversationQueue(_)
        )
    }

    /// Private room this destination is scoped to, if any.
    #[must_use]
    pub fn conversation(&self) -> Option<&ConversationId> {
        match self {
            Self::ConversationTopic(id) | Self::ConversationQueue(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublicTopic => f.write_str(PUBLIC_TOPIC),
            Self::PresenceTopic => f.write_str(PRESENCE_TOPIC),
            Self::ConversationTopic(id) => write!(f, "{CONVERSATION_TOPIC_PREFIX}{id}"),
            Self::ConversationQueue(id) => write!(f, "{CONVERSATION_QUEUE_PREFIX}{id}"),
            Self::SendPublic => f.write_str(SEND_PUBLIC),
            Self::SendPrivate => f.write_str(SEND_PRIVATE),
            Self::MarkRead => f.write_str(MARK_READ),
        }
    }
}

impl FromStr for Destination {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ProtocolError::UnknownDestination(s.to_string());
        let scoped = |prefix: &str| {
            s.strip_prefix(prefix).filter(|id| !id.is_empty()).map(ConversationId::from)
        };

        match s {
            PUBLIC_TOPIC => Ok(Self::PublicTopic),
            PRESENCE_TOPIC => Ok(Self::PresenceTopic),
            SEND_PUBLIC => Ok(Self::SendPublic),
            SEND_PRIVATE => Ok(Self::SendPrivate),
            MARK_READ => Ok(Self::MarkRead),
            _ => {
                if let Some(id) = scoped(CONVERSATION_TOPIC_PREFIX) {
                    Ok(Self::ConversationTopic(id))
                } else if let Some(id) = scoped(CONVERSATION_QUEUE_PREFIX) {
                    Ok(Self::ConversationQueue(id))
                } else {
                    Err(unknown())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_paths() {
        let id = ConversationId::from("42");
        assert_eq!(Destination::PublicTopic.to_string(), "/topic/public");
        assert_eq!(Destination::ConversationTopic(id.clone()).to_string(), "/topic/conversation.42");
        assert_eq!(Destination::ConversationQueue(id).to_string(), "/queue/conversation.42");
        assert_eq!(Destination::MarkRead.to_string(), "/app/mark-read");
    }

    #[test]
    fn parse_is_inverse_of_display() {
        let all = [
            Destination::PublicTopic,
            Destination::PresenceTopic,
            Destination::ConversationTopic("a.b".into()),
            Destination::ConversationQueue("7".into()),
            Destination::SendPublic,
            Destination::SendPrivate,
            Destination::MarkRead,
        ];
        for dest in all {
            assert_eq!(dest.to_string().parse::<Destination>(), Ok(dest));
        }
    }

    #[test]
    fn scoped_destination_requires_id() {
        assert!("/topic/conversation.".parse::<Destination>().is_err());
        assert!("/topic/other".parse::<Destination>().is_err());
    }

    #[test]
    fn only_topics_and_queues_are_subscribable() {
        assert!(Destination::PresenceTopic.is_subscribable());
        assert!(Destination::ConversationQueue("1".into()).is_subscribable());
        assert!(!Destination::SendPrivate.is_subscribable());
    }
}
