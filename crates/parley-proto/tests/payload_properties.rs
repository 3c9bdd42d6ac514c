//! Property-based tests for payloads on the wire.
//!
//! A payload is published as the JSON body of a SEND frame, travels as the
//! text of a WebSocket message and is parsed back by the receiving client.
//! These tests check that nothing is lost on the way for ALL messages, not
//! just specific examples.

use parley_proto::{
    Command, ConversationId, Destination, Packet, Payload, header,
    payloads::{ChatMessage, MarkRead, MessageKind, MessageStatus, PresenceUpdate},
};
use proptest::prelude::*;

fn arbitrary_room() -> impl Strategy<Value = ConversationId> {
    "[a-z0-9-]{1,12}".prop_map(ConversationId::from)
}

fn arbitrary_message() -> impl Strategy<Value = ChatMessage> {
    (
        (proptest::option::of(any::<u64>()), proptest::option::of("[a-f0-9]{16}")),
        ("[a-z]{1,10}", any::<u64>(), any::<String>()),
        prop_oneof![Just(MessageKind::Text), Just(MessageKind::Join), Just(MessageKind::ReadReceipt)],
        prop_oneof![Just(MessageStatus::Sent), Just(MessageStatus::Read)],
        proptest::option::of(arbitrary_room()),
        prop::collection::vec(any::<u64>(), 0..4),
    )
        .prop_map(|((server_id, client_id), (sender, sender_id, content), kind, status, room, read_ids)| {
            ChatMessage {
                server_id,
                client_id,
                sender,
                sender_id,
                content,
                kind,
                status,
                conversation_id: room,
                read_ids,
            }
        })
}

/// Publish `payload` to `destination`, put it on the wire and read it back.
fn over_the_wire<P: Payload>(payload: &P, destination: &Destination) -> (Packet, P) {
    let frame = payload.to_send_frame(destination).unwrap();
    let text = Packet::from(frame).to_text();
    let packet = Packet::decode(text.as_bytes()).unwrap();

    let Packet::Frame(frame) = &packet else {
        unreachable!("a SEND frame never decodes to a heart-beat");
    };
    let decoded = P::from_frame(frame).unwrap();
    (packet, decoded)
}

proptest! {
    /// Every chat message survives publishing unchanged.
    #[test]
    fn prop_chat_message_survives_the_wire(message in arbitrary_message()) {
        let (packet, decoded) = over_the_wire(&message, &Destination::SendPublic);

        let Packet::Frame(frame) = packet else { unreachable!() };
        prop_assert_eq!(frame.command, Command::Send);
        prop_assert_eq!(frame.header(header::DESTINATION), Some("/app/sendMessage"));
        prop_assert_eq!(decoded, message);
    }

    /// Read receipts keep their room and reader.
    #[test]
    fn prop_mark_read_survives_the_wire(room in arbitrary_room(), reader in any::<u64>()) {
        let receipt = MarkRead { conversation_id: room, reader_id: reader };
        let (_, decoded) = over_the_wire(&receipt, &Destination::MarkRead);

        prop_assert_eq!(decoded, receipt);
    }

    /// Presence updates keep user and status.
    #[test]
    fn prop_presence_survives_the_wire(user in any::<u64>(), online in any::<bool>()) {
        let update = if online { PresenceUpdate::online(user) } else { PresenceUpdate::offline(user) };
        let (_, decoded) = over_the_wire(&update, &Destination::PresenceTopic);

        prop_assert_eq!(decoded, update);
    }

    /// Conversation destinations parse back to the room they were built for.
    #[test]
    fn prop_conversation_destinations_parse(room in arbitrary_room()) {
        for destination in [
            Destination::ConversationTopic(room.clone()),
            Destination::ConversationQueue(room.clone()),
        ] {
            let parsed: Destination = destination.to_string().parse().unwrap();
            prop_assert_eq!(parsed.conversation(), Some(&room));
            prop_assert!(parsed.is_subscribable());
        }
    }
}

#[test]
fn numeric_conversation_id_is_accepted() {
    let message: ChatMessage = serde_json::from_str(
        r#"{"id": 9, "sender": "sam", "senderId": 7, "content": "hi", "type": "TEXT", "conversationId": 42}"#,
    )
    .unwrap();

    assert_eq!(message.server_id, Some(9));
    assert_eq!(message.conversation_id, Some(ConversationId::from(42u64)));
    assert_eq!(message.status, MessageStatus::Sent);
}
