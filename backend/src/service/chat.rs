use std::sync::Arc;

use log::{debug, warn};
use socketioxide::socket::Sid;

use types::domain::{ChatLine, ServerEvent};
use types::state::Timestamped;

use crate::outbound::{encode, Outbound};
use crate::repository::rooms::RoomRepository;

/// Room chat. Every line goes to every member of the room, the sender included.
///
/// Each operation returns the members whose delivery failed; the caller treats
/// them as disconnected.
#[derive(Clone)]
pub struct ChatService {
    pub room_repository: RoomRepository,
    pub outbound: Arc<dyn Outbound>,
}

impl ChatService {
    pub fn join(&self, room: &str, sid: Sid, username: &str) -> Vec<Sid> {
        if self.room_repository.join(room, sid, username) {
            debug!("{} joined room {}", username, room);
        }
        self.broadcast(room, ChatLine::joined(room, username))
    }

    pub fn message(&self, room: &str, username: &str, msg: &str) -> Vec<Sid> {
        self.broadcast(room, ChatLine::said(room, username, msg))
    }

    /// Announces the departure to the room, the leaver included, then detaches.
    /// Leaving a room the socket is not in does nothing.
    pub fn leave(&self, room: &str, sid: Sid, username: &str) -> Vec<Sid> {
        if !self.room_repository.is_member(room, sid) {
            debug!("{} is not in room {}, ignoring leave", username, room);
            return Vec::new();
        }
        let failed = self.broadcast(room, ChatLine::left(room, username));
        self.room_repository.leave(room, sid);
        failed
    }

    pub fn broadcast(&self, room: &str, line: ChatLine) -> Vec<Sid> {
        let Some(payload) = encode(ServerEvent::Message, &Timestamped::new(line)) else {
            return Vec::new();
        };
        self.room_repository.broadcast(room, |sid| {
            match self.outbound.emit(sid, ServerEvent::Message, &payload) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Chat delivery to {} in room {} failed: {}", sid, room, e);
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::testing::RecordingOutbound;

    fn setup() -> (ChatService, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::default());
        let service = ChatService {
            room_repository: RoomRepository::new(),
            outbound: outbound.clone(),
        };
        (service, outbound)
    }

    #[test]
    fn test_lobby_conversation_order() {
        let (chat, outbound) = setup();
        let alice = Sid::new();
        let bob = Sid::new();

        chat.join("lobby", alice, "alice");
        chat.join("lobby", bob, "bob");
        chat.message("lobby", "bob", "hello");

        assert_eq!(
            outbound.chat_lines(alice),
            vec!["alice has joined lobby", "bob has joined lobby", "bob: hello"]
        );
        assert_eq!(
            outbound.chat_lines(bob),
            vec!["bob has joined lobby", "bob: hello"]
        );
    }

    #[test]
    fn test_leave_is_announced_to_leaver_then_stops_delivery() {
        let (chat, outbound) = setup();
        let alice = Sid::new();
        let bob = Sid::new();
        chat.join("lobby", alice, "alice");
        chat.join("lobby", bob, "bob");

        chat.leave("lobby", bob, "bob");
        chat.message("lobby", "alice", "anyone here?");

        assert_eq!(
            outbound.chat_lines(bob),
            vec!["bob has joined lobby", "bob has left lobby"]
        );
        assert_eq!(
            outbound.chat_lines(alice).last().map(String::as_str),
            Some("alice: anyone here?")
        );
        assert!(!chat.room_repository.is_member("lobby", bob));
    }

    #[test]
    fn test_leave_without_membership_is_silent() {
        let (chat, outbound) = setup();
        let alice = Sid::new();
        chat.join("lobby", alice, "alice");

        let failed = chat.leave("lobby", Sid::new(), "mallory");
        assert!(failed.is_empty());
        assert_eq!(outbound.chat_lines(alice), vec!["alice has joined lobby"]);
    }

    #[test]
    fn test_rooms_are_isolated() {
        let (chat, outbound) = setup();
        let alice = Sid::new();
        let bob = Sid::new();
        chat.join("lobby", alice, "alice");
        chat.join("tavern", bob, "bob");

        chat.message("tavern", "bob", "a round for everyone");

        assert_eq!(outbound.chat_lines(alice), vec!["alice has joined lobby"]);
        assert_eq!(
            outbound.chat_lines(bob),
            vec!["bob has joined tavern", "bob: a round for everyone"]
        );
    }

    #[test]
    fn test_failed_member_does_not_block_others() {
        let (chat, outbound) = setup();
        let alice = Sid::new();
        let bob = Sid::new();
        let carol = Sid::new();
        chat.join("lobby", alice, "alice");
        chat.join("lobby", bob, "bob");
        chat.join("lobby", carol, "carol");
        outbound.close(bob);

        let failed = chat.message("lobby", "alice", "roll call");

        assert_eq!(failed, vec![bob]);
        assert_eq!(
            outbound.chat_lines(alice).last().map(String::as_str),
            Some("alice: roll call")
        );
        assert_eq!(
            outbound.chat_lines(carol).last().map(String::as_str),
            Some("alice: roll call")
        );
    }

    #[test]
    fn test_message_to_empty_room_goes_nowhere() {
        let (chat, outbound) = setup();
        assert!(chat.message("void", "alice", "echo?").is_empty());
        assert_eq!(outbound.total_sent(), 0);
    }
}
