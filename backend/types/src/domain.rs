use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use strum_macros::{AsRefStr, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;
use validator::Validate;

use crate::error::Error;

#[derive(Debug, Clone, Validate, Deserialize, Serialize)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(Debug, Clone, Validate, Deserialize, Serialize)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    #[validate(length(min = 8))]
    pub password: String,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

/// A bank account. `token` is the public, QR-encoded transfer destination.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub user_id: Uuid,
    pub token: String,
    pub balance: i64,
}

/// Bank transfer form. `amount` arrives as text and is parsed by [`TransferRequest::amount`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferRequest {
    pub target_token: String,
    pub amount: String,
}

impl TransferRequest {
    pub fn amount(&self) -> Result<i64, Error> {
        self.amount
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::InvalidAmount)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocketAuth {
    pub token: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomRequest {
    pub room: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    pub room: String,
    #[serde(default)]
    pub username: Option<String>,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallRequest {
    pub target_id: Uuid,
    pub offer: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerRequest {
    pub target_id: Uuid,
    pub answer: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IceCandidateRequest {
    pub target_id: Uuid,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ClientEvent {
    Join,
    Leave,
    Message,
    CallUser,
    AnswerCall,
    IceCandidate,
}

impl From<ClientEvent> for Cow<'static, str> {
    fn from(event: ClientEvent) -> Self {
        Cow::Borrowed(event.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerEvent {
    Message,
    IncomingCall,
    CallAnswered,
    IceCandidate,
    ServiceError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    pub room: String,
    pub kind: ChatKind,
    pub text: String,
}

impl ChatLine {
    pub fn joined(room: &str, username: &str) -> Self {
        ChatLine {
            room: room.to_string(),
            kind: ChatKind::System,
            text: format!("{} has joined {}", username, room),
        }
    }

    pub fn left(room: &str, username: &str) -> Self {
        ChatLine {
            room: room.to_string(),
            kind: ChatKind::System,
            text: format!("{} has left {}", username, room),
        }
    }

    pub fn said(room: &str, username: &str, msg: &str) -> Self {
        ChatLine {
            room: room.to_string(),
            kind: ChatKind::User,
            text: format!("{}: {}", username, msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingCall {
    pub from: Uuid,
    pub from_name: String,
    pub offer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAnswered {
    pub from: Uuid,
    pub from_name: String,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedIceCandidate {
    pub from: Uuid,
    pub from_name: String,
    pub candidate: Value,
}
