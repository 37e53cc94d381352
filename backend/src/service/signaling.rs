use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use socketioxide::socket::Sid;
use uuid::Uuid;

use types::domain::{CallAnswered, IncomingCall, RelayedIceCandidate, ServerEvent};
use types::error::Error;

use crate::domain::session::Session;
use crate::outbound::{encode, Outbound};
use crate::repository::connections::ConnectionRegistry;

/// WebRTC call-setup payloads. They are relayed verbatim and never inspected.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
}

impl Signal {
    pub fn event(&self) -> ServerEvent {
        match self {
            Signal::Offer(_) => ServerEvent::IncomingCall,
            Signal::Answer(_) => ServerEvent::CallAnswered,
            Signal::Candidate(_) => ServerEvent::IceCandidate,
        }
    }

    fn into_payload(self, from: &Session) -> Option<Value> {
        let event = self.event();
        let from_name = from.username.clone();
        match self {
            Signal::Offer(offer) => encode(
                event,
                &IncomingCall {
                    from: from.user_id,
                    from_name,
                    offer,
                },
            ),
            Signal::Answer(answer) => encode(
                event,
                &CallAnswered {
                    from: from.user_id,
                    from_name,
                    answer,
                },
            ),
            Signal::Candidate(candidate) => encode(
                event,
                &RelayedIceCandidate {
                    from: from.user_id,
                    from_name,
                    candidate,
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered(Sid),
    /// Target has no live connection. The signal is dropped.
    NotConnected,
    Failed(Sid),
    Unencodable,
}

/// Point-to-point relay of call signaling to a user's current connection.
/// Best effort: nothing is retried or buffered.
#[derive(Clone)]
pub struct SignalingRouter {
    pub connection_registry: ConnectionRegistry,
    pub outbound: Arc<dyn Outbound>,
}

impl SignalingRouter {
    pub fn call(&self, from: &Session, to: Uuid, offer: Value) -> Delivery {
        self.relay(from, to, Signal::Offer(offer))
    }

    pub fn answer(&self, from: &Session, to: Uuid, answer: Value) -> Delivery {
        self.relay(from, to, Signal::Answer(answer))
    }

    pub fn ice_candidate(&self, from: &Session, to: Uuid, candidate: Value) -> Delivery {
        self.relay(from, to, Signal::Candidate(candidate))
    }

    pub fn relay(&self, from: &Session, to: Uuid, signal: Signal) -> Delivery {
        let event = signal.event();
        let Some(sid) = self.connection_registry.lookup(to) else {
            warn!(
                "Dropping {} from {} to {}: {}",
                event.as_ref(),
                from.user_id,
                to,
                Error::UserNotConnected
            );
            return Delivery::NotConnected;
        };
        let Some(payload) = signal.into_payload(from) else {
            return Delivery::Unencodable;
        };
        match self.outbound.emit(sid, event, &payload) {
            Ok(()) => {
                debug!("Relayed {} from {} to {}", event.as_ref(), from.user_id, to);
                Delivery::Delivered(sid)
            }
            Err(e) => {
                warn!(
                    "Relaying {} from {} to {} failed: {}",
                    event.as_ref(),
                    from.user_id,
                    to,
                    e
                );
                Delivery::Failed(sid)
            }
        }
    }
}
