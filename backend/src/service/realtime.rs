use std::sync::Arc;

use eyre::{ensure, Result};
use log::{debug, info};
use socketioxide::socket::Sid;
use uuid::Uuid;

use types::domain::{
    AnswerRequest, CallRequest, ChatRequest, ClientEvent, IceCandidateRequest, RoomRequest,
    RoomSummary,
};
use types::error::Error;

use crate::domain::session::Session;
use crate::outbound::Outbound;
use crate::repository::connections::ConnectionRegistry;
use crate::repository::rooms::RoomRepository;
use crate::service::chat::ChatService;
use crate::service::signaling::{Delivery, SignalingRouter};

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Join(RoomRequest),
    Leave(RoomRequest),
    Message(ChatRequest),
    CallUser(CallRequest),
    AnswerCall(AnswerRequest),
    IceCandidate(IceCandidateRequest),
}

impl InboundEvent {
    pub fn kind(&self) -> ClientEvent {
        match self {
            InboundEvent::Join(_) => ClientEvent::Join,
            InboundEvent::Leave(_) => ClientEvent::Leave,
            InboundEvent::Message(_) => ClientEvent::Message,
            InboundEvent::CallUser(_) => ClientEvent::CallUser,
            InboundEvent::AnswerCall(_) => ClientEvent::AnswerCall,
            InboundEvent::IceCandidate(_) => ClientEvent::IceCandidate,
        }
    }
}

#[derive(Clone)]
pub struct RealtimeService {
    pub connection_registry: ConnectionRegistry,
    pub room_repository: RoomRepository,
    pub chat_service: ChatService,
    pub signaling_router: SignalingRouter,
    pub outbound: Arc<dyn Outbound>,
}

impl RealtimeService {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        let connection_registry = ConnectionRegistry::new();
        let room_repository = RoomRepository::new();
        RealtimeService {
            chat_service: ChatService {
                room_repository: room_repository.clone(),
                outbound: outbound.clone(),
            },
            signaling_router: SignalingRouter {
                connection_registry: connection_registry.clone(),
                outbound: outbound.clone(),
            },
            connection_registry,
            room_repository,
            outbound,
        }
    }

    /// Binds `sid` to the session's user. A connection the user already had is
    /// pulled out of its rooms and closed.
    pub fn connect(&self, session: &Session, sid: Sid) {
        if let Some(previous) = self.connection_registry.register(session.user_id, sid) {
            info!(
                "User {} reconnected on {}, closing {}",
                session.user_id, sid, previous
            );
            self.room_repository.leave_all(previous);
            self.outbound.disconnect(previous);
        } else {
            info!("User {} connected on {}", session.user_id, sid);
        }
    }

    pub fn disconnect(&self, sid: Sid) {
        self.drop_connection(sid);
    }

    fn drop_connection(&self, sid: Sid) {
        let user_id = self.connection_registry.unregister(sid);
        let rooms = self.room_repository.leave_all(sid);
        debug!(
            "Dropped connection {} (user {:?}, rooms {:?})",
            sid, user_id, rooms
        );
    }

    // a connection that refused a delivery is treated as dead and closed
    fn evict(&self, sid: Sid) {
        self.drop_connection(sid);
        self.outbound.disconnect(sid);
    }

    fn prune(&self, failed: Vec<Sid>) {
        for sid in failed {
            self.evict(sid);
        }
    }

    pub fn disconnect_user(&self, user_id: Uuid) {
        if let Some(sid) = self.connection_registry.lookup(user_id) {
            info!("Closing connection {} of user {}", sid, user_id);
            self.evict(sid);
        }
    }

    pub fn handle(&self, sid: Sid, session: &Session, event: InboundEvent) -> Result<()> {
        if !self.connection_registry.is_current(session.user_id, sid) {
            debug!(
                "Ignoring {} from superseded connection {} of user {}",
                event.kind().as_ref(),
                sid,
                session.user_id
            );
            return Ok(());
        }
        match event {
            InboundEvent::Join(request) => {
                let room = room_name(&request.room)?;
                let username = sender_name(session, request.username.as_deref());
                self.prune(self.chat_service.join(room, sid, username));
            }
            InboundEvent::Leave(request) => {
                let room = room_name(&request.room)?;
                let username = sender_name(session, request.username.as_deref());
                self.prune(self.chat_service.leave(room, sid, username));
            }
            InboundEvent::Message(request) => {
                let room = room_name(&request.room)?;
                let username = sender_name(session, request.username.as_deref());
                self.prune(self.chat_service.message(room, username, &request.msg));
            }
            InboundEvent::CallUser(request) => {
                let delivery = self
                    .signaling_router
                    .call(session, request.target_id, request.offer);
                self.settle(delivery);
            }
            InboundEvent::AnswerCall(request) => {
                let delivery =
                    self.signaling_router
                        .answer(session, request.target_id, request.answer);
                self.settle(delivery);
            }
            InboundEvent::IceCandidate(request) => {
                let delivery = self.signaling_router.ice_candidate(
                    session,
                    request.target_id,
                    request.candidate,
                );
                self.settle(delivery);
            }
        }
        Ok(())
    }

    fn settle(&self, delivery: Delivery) {
        if let Delivery::Failed(sid) = delivery {
            self.evict(sid);
        }
    }

    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.room_repository.summaries()
    }
}

fn room_name(room: &str) -> Result<&str> {
    let room = room.trim();
    ensure!(!room.is_empty(), Error::InvalidRoom);
    Ok(room)
}

// the authenticated profile name always wins over what the client claims
fn sender_name<'a>(session: &'a Session, claimed: Option<&str>) -> &'a str {
    if let Some(claimed) = claimed {
        if claimed != session.username {
            debug!(
                "User {} claimed name {:?}, using {:?}",
                session.user_id, claimed, session.username
            );
        }
    }
    &session.username
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::outbound::testing::RecordingOutbound;
    use types::domain::ServerEvent;

    fn setup() -> (RealtimeService, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::default());
        (RealtimeService::new(outbound.clone()), outbound)
    }

    fn session(id: u128, name: &str) -> Session {
        Session::new(Uuid::from_u128(id), name)
    }

    fn join(room: &str) -> InboundEvent {
        InboundEvent::Join(RoomRequest {
            room: room.to_string(),
            username: None,
        })
    }

    fn say(room: &str, msg: &str) -> InboundEvent {
        InboundEvent::Message(ChatRequest {
            room: room.to_string(),
            username: None,
            msg: msg.to_string(),
        })
    }

    fn call(target: u128) -> InboundEvent {
        InboundEvent::CallUser(CallRequest {
            target_id: Uuid::from_u128(target),
            offer: json!({ "sdp": "offer" }),
        })
    }

    #[test]
    fn test_reconnect_supersedes_previous_connection() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_old, bob_new) = (Sid::new(), Sid::new(), Sid::new());

        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_old);
        hub.handle(alice_sid, &alice, join("lobby")).unwrap();
        hub.handle(bob_old, &bob, join("lobby")).unwrap();

        hub.connect(&bob, bob_new);
        assert_eq!(outbound.disconnected(), vec![bob_old]);
        assert!(!hub.room_repository.is_member("lobby", bob_old));

        hub.handle(bob_new, &bob, join("lobby")).unwrap();
        hub.handle(alice_sid, &alice, say("lobby", "welcome back")).unwrap();
        hub.handle(alice_sid, &alice, call(2)).unwrap();

        assert_eq!(
            outbound.chat_lines(bob_new),
            vec!["bob has joined lobby", "alice: welcome back"]
        );
        let bob_events: Vec<ServerEvent> = outbound
            .received(bob_new)
            .into_iter()
            .map(|(event, _)| event)
            .collect();
        assert_eq!(bob_events.last(), Some(&ServerEvent::IncomingCall));
        assert!(!outbound
            .chat_lines(bob_old)
            .contains(&"alice: welcome back".to_string()));
    }

    #[test]
    fn test_stale_disconnect_after_reconnect_keeps_new_session() {
        let (hub, _outbound) = setup();
        let bob = session(2, "bob");
        let (old_sid, new_sid) = (Sid::new(), Sid::new());

        hub.connect(&bob, old_sid);
        hub.connect(&bob, new_sid);
        hub.handle(new_sid, &bob, join("lobby")).unwrap();
        hub.disconnect(old_sid);

        assert_eq!(hub.connection_registry.lookup(bob.user_id), Some(new_sid));
        assert!(hub.room_repository.is_member("lobby", new_sid));
    }

    #[test]
    fn test_superseded_connection_events_are_ignored() {
        let (hub, outbound) = setup();
        let bob = session(2, "bob");
        let (old_sid, new_sid) = (Sid::new(), Sid::new());
        hub.connect(&bob, old_sid);
        hub.connect(&bob, new_sid);

        hub.handle(old_sid, &bob, join("lobby")).unwrap();

        assert_eq!(hub.room_repository.room_count(), 0);
        assert_eq!(outbound.total_sent(), 0);
    }

    #[test]
    fn test_disconnect_leaves_every_room() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_sid) = (Sid::new(), Sid::new());
        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_sid);
        hub.handle(alice_sid, &alice, join("lobby")).unwrap();
        hub.handle(alice_sid, &alice, join("tavern")).unwrap();
        hub.handle(bob_sid, &bob, join("lobby")).unwrap();

        hub.disconnect(alice_sid);

        assert!(hub.room_repository.rooms_of(alice_sid).is_empty());
        assert!(!hub.room_repository.is_member("lobby", alice_sid));
        assert_eq!(hub.room_repository.room_count(), 1);
        assert_eq!(hub.connection_registry.lookup(alice.user_id), None);

        hub.handle(bob_sid, &bob, say("lobby", "bye alice")).unwrap();
        assert!(!outbound
            .chat_lines(alice_sid)
            .contains(&"bob: bye alice".to_string()));
    }

    #[test]
    fn test_failed_chat_delivery_cleans_up_connection() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_sid) = (Sid::new(), Sid::new());
        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_sid);
        hub.handle(alice_sid, &alice, join("lobby")).unwrap();
        hub.handle(bob_sid, &bob, join("lobby")).unwrap();
        outbound.close(bob_sid);

        hub.handle(alice_sid, &alice, say("lobby", "ping")).unwrap();

        assert!(!hub.room_repository.is_member("lobby", bob_sid));
        assert_eq!(hub.connection_registry.lookup(bob.user_id), None);
        assert_eq!(outbound.disconnected(), vec![bob_sid]);
        assert_eq!(
            outbound.chat_lines(alice_sid).last().map(String::as_str),
            Some("alice: ping")
        );
    }

    #[test]
    fn test_closed_connection_can_rejoin_after_reconnect() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_sid, bob_again) = (Sid::new(), Sid::new(), Sid::new());
        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_sid);
        hub.handle(alice_sid, &alice, join("lobby")).unwrap();
        hub.handle(bob_sid, &bob, join("lobby")).unwrap();
        outbound.close(bob_sid);
        hub.handle(alice_sid, &alice, say("lobby", "ping")).unwrap();

        hub.connect(&bob, bob_again);
        hub.handle(bob_again, &bob, join("lobby")).unwrap();

        assert!(hub.room_repository.is_member("lobby", bob_again));
        assert_eq!(hub.connection_registry.lookup(bob.user_id), Some(bob_again));
        assert_eq!(
            outbound.chat_lines(alice_sid).last().map(String::as_str),
            Some("bob has joined lobby")
        );
    }

    #[test]
    fn test_disconnect_user_closes_live_connection() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_sid) = (Sid::new(), Sid::new());
        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_sid);
        hub.handle(bob_sid, &bob, join("lobby")).unwrap();

        hub.disconnect_user(bob.user_id);
        hub.handle(alice_sid, &alice, call(2)).unwrap();

        assert_eq!(outbound.disconnected(), vec![bob_sid]);
        assert_eq!(hub.connection_registry.lookup(bob.user_id), None);
        assert!(!hub.room_repository.is_member("lobby", bob_sid));
        assert!(!outbound
            .received(bob_sid)
            .iter()
            .any(|(event, _)| *event == ServerEvent::IncomingCall));
    }

    #[test]
    fn test_disconnect_user_without_connection_is_noop() {
        let (hub, outbound) = setup();
        hub.disconnect_user(Uuid::from_u128(7));
        assert!(outbound.disconnected().is_empty());
    }

    #[test]
    fn test_failed_signal_delivery_cleans_up_connection() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let bob = session(2, "bob");
        let (alice_sid, bob_sid) = (Sid::new(), Sid::new());
        hub.connect(&alice, alice_sid);
        hub.connect(&bob, bob_sid);
        outbound.close(bob_sid);

        hub.handle(alice_sid, &alice, call(2)).unwrap();

        assert_eq!(hub.connection_registry.lookup(bob.user_id), None);
        assert_eq!(outbound.disconnected(), vec![bob_sid]);
    }

    #[test]
    fn test_call_to_unconnected_user_is_not_an_error() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let alice_sid = Sid::new();
        hub.connect(&alice, alice_sid);

        assert!(hub.handle(alice_sid, &alice, call(42)).is_ok());
        assert_eq!(outbound.total_sent(), 0);
    }

    #[test]
    fn test_blank_room_is_rejected() {
        let (hub, _outbound) = setup();
        let alice = session(1, "alice");
        let alice_sid = Sid::new();
        hub.connect(&alice, alice_sid);

        let error = hub.handle(alice_sid, &alice, join("   ")).unwrap_err();
        assert_eq!(error.downcast::<Error>().unwrap(), Error::InvalidRoom);
        assert_eq!(hub.room_repository.room_count(), 0);
    }

    #[test]
    fn test_claimed_username_is_ignored() {
        let (hub, outbound) = setup();
        let alice = session(1, "alice");
        let alice_sid = Sid::new();
        hub.connect(&alice, alice_sid);

        let event = InboundEvent::Message(ChatRequest {
            room: "lobby".to_string(),
            username: Some("the queen".to_string()),
            msg: "hi".to_string(),
        });
        hub.handle(alice_sid, &alice, join("lobby")).unwrap();
        hub.handle(alice_sid, &alice, event).unwrap();

        assert_eq!(
            outbound.chat_lines(alice_sid),
            vec!["alice has joined lobby", "alice: hi"]
        );
    }

    #[test]
    fn test_room_names_are_trimmed() {
        let (hub, _outbound) = setup();
        let alice = session(1, "alice");
        let alice_sid = Sid::new();
        hub.connect(&alice, alice_sid);

        hub.handle(alice_sid, &alice, join("  lobby ")).unwrap();
        let rooms = hub.rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].room, "lobby");
        assert_eq!(rooms[0].members, vec!["alice".to_string()]);
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(join("lobby").kind(), ClientEvent::Join);
        assert_eq!(call(1).kind(), ClientEvent::CallUser);
    }
}
