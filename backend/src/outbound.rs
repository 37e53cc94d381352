use log::{error, warn};
use serde::Serialize;
use serde_json::Value;
use socketioxide::socket::Sid;
use socketioxide::SocketIo;
use tap::TapFallible;
use thiserror::Error;

use types::domain::ServerEvent;

pub const NAMESPACE: &str = "/";

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("connection {0} is no longer open")]
    Gone(Sid),
    #[error("transport rejected message: {0}")]
    Transport(String),
}

pub trait Outbound: Send + Sync {
    fn emit(&self, sid: Sid, event: ServerEvent, payload: &Value) -> Result<(), DeliveryError>;

    fn disconnect(&self, sid: Sid);
}

pub fn encode<T: Serialize>(event: ServerEvent, data: &T) -> Option<Value> {
    serde_json::to_value(data)
        .tap_err(|e| error!("Failed to encode {} payload: {}", event.as_ref(), e))
        .ok()
}

#[derive(Clone)]
pub struct SocketIoOutbound {
    io: SocketIo,
}

impl SocketIoOutbound {
    pub fn new(io: SocketIo) -> Self {
        SocketIoOutbound { io }
    }
}

impl Outbound for SocketIoOutbound {
    fn emit(&self, sid: Sid, event: ServerEvent, payload: &Value) -> Result<(), DeliveryError> {
        let socket = self
            .io
            .of(NAMESPACE)
            .and_then(|operator| operator.get_socket(sid))
            .ok_or(DeliveryError::Gone(sid))?;
        socket
            .emit(event, payload)
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }

    fn disconnect(&self, sid: Sid) {
        if let Some(socket) = self
            .io
            .of(NAMESPACE)
            .and_then(|operator| operator.get_socket(sid))
        {
            if let Err(e) = socket.disconnect() {
                warn!("Failed to disconnect socket {}: {:?}", sid, e);
            }
        }
    }
}
