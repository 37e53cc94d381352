use std::sync::Arc;

use eyre::{bail, eyre, Result};
use futures_util::FutureExt;
use log::debug;
use reqwest::Client as ReqwestClient;
use reqwest::StatusCode;
use rust_socketio::asynchronous::Client as SocketClient;
use rust_socketio::asynchronous::ClientBuilder;
use rust_socketio::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use types::domain::*;
use types::state::Timestamped;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Chat(Timestamped<ChatLine>),
    IncomingCall(IncomingCall),
    CallAnswered(CallAnswered),
    IceCandidate(RelayedIceCandidate),
    ServiceError(String),
}

pub type Inbox = Arc<RwLock<Vec<Received>>>;

fn first_value<T: DeserializeOwned>(payload: Payload) -> Option<T> {
    match payload {
        Payload::Text(values) => values
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Error deserializing: {:?}", e);
                    None
                }
            })
            .next(),
        _ => None,
    }
}

async fn record<T: DeserializeOwned + Send>(
    payload: Payload,
    wrap: fn(T) -> Received,
    inbox: Inbox,
) {
    if let Some(value) = first_value(payload) {
        inbox.write().await.push(wrap(value));
    }
}

#[allow(deprecated)]
async fn default_callback(payload: Payload) {
    match payload {
        Payload::Text(values) => debug!("Received text: {:#?}", values),
        Payload::Binary(bin_data) => debug!("Received bytes: {:#?}", bin_data),
        Payload::String(str) => debug!("Received str: {}", str),
    }
}

pub struct Client {
    pub client: ReqwestClient,
    pub ws_client: Option<SocketClient>,
    pub token: Option<String>,
    pub user: Option<User>,
    pub inbox: Inbox,
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            ws_client: None,
            token: None,
            user: None,
            inbox: Inbox::default(),
            base_url: base_url.into(),
        }
    }

    pub fn new_with_token(base_url: impl Into<String>, token: String) -> Self {
        let mut client = Self::new(base_url);
        client.token = Some(token);
        client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<String> {
        let token = self.token.as_ref().ok_or_else(|| eyre!("No token"))?;
        Ok(format!("Bearer {}", token))
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        let response = self
            .client
            .post(self.url("/signup"))
            .json(&request)
            .send()
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(response.json().await?),
            _ => bail!(response.text().await?),
        }
    }

    /// Logs in and opens the realtime connection with the issued token.
    pub async fn login(&mut self, request: LoginRequest) -> Result<String> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&request)
            .send()
            .await?;
        let token = match response.status() {
            StatusCode::OK => response.text().await?,
            _ => bail!(response.text().await?),
        };
        self.token = Some(token.clone());
        self.create_ws_connection().await?;
        Ok(token)
    }

    pub async fn logout(&mut self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/logout"))
            .header("Authorization", self.bearer()?)
            .send()
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => {
                self.token = None;
                if let Some(ws_client) = self.ws_client.take() {
                    ws_client.disconnect().await?;
                }
                Ok(())
            }
            _ => bail!(response.text().await?),
        }
    }

    pub async fn get_profile(&mut self) -> Result<User> {
        let user: User = self.get_json("/profile").await?;
        self.user.replace(user.clone());
        Ok(user)
    }

    pub async fn get_bank(&self) -> Result<Account> {
        self.get_json("/bank").await
    }

    pub async fn get_rooms(&self) -> Result<Vec<RoomSummary>> {
        self.get_json("/rooms").await
    }

    pub async fn transfer(&self, target_token: &str, amount: &str) -> Result<Account> {
        let request = TransferRequest {
            target_token: target_token.to_string(),
            amount: amount.to_string(),
        };
        let response = self
            .client
            .post(self.url("/bank/transfer"))
            .header("Authorization", self.bearer()?)
            .form(&request)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn get_qr_code(&self, user_id: Uuid) -> Result<String> {
        let response = self
            .client
            .get(self.url(&format!("/bank/qr/{}", user_id)))
            .header("Authorization", self.bearer()?)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.text().await?),
            _ => bail!(response.text().await?),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("Authorization", self.bearer()?)
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            _ => bail!(response.text().await?),
        }
    }

    pub async fn create_ws_connection(&mut self) -> Result<()> {
        let token = self.token.clone().ok_or_else(|| eyre!("No token"))?;

        let chat_inbox = self.inbox.clone();
        let chat_callback = move |payload, _| {
            record(payload, Received::Chat, chat_inbox.clone()).boxed()
        };
        let call_inbox = self.inbox.clone();
        let call_callback = move |payload, _| {
            record(payload, Received::IncomingCall, call_inbox.clone()).boxed()
        };
        let answer_inbox = self.inbox.clone();
        let answer_callback = move |payload, _| {
            record(payload, Received::CallAnswered, answer_inbox.clone()).boxed()
        };
        let candidate_inbox = self.inbox.clone();
        let candidate_callback = move |payload, _| {
            record(payload, Received::IceCandidate, candidate_inbox.clone()).boxed()
        };
        let error_inbox = self.inbox.clone();
        let error_callback = move |payload, _| {
            record(payload, Received::ServiceError, error_inbox.clone()).boxed()
        };
        let default_callback = |payload, _| default_callback(payload).boxed();

        let ws_client = ClientBuilder::new(self.base_url.as_str())
            .namespace("/")
            .auth(json!({ "token": token }))
            .on(ServerEvent::Message.as_ref(), chat_callback)
            .on(ServerEvent::IncomingCall.as_ref(), call_callback)
            .on(ServerEvent::CallAnswered.as_ref(), answer_callback)
            .on(ServerEvent::IceCandidate.as_ref(), candidate_callback)
            .on(ServerEvent::ServiceError.as_ref(), error_callback)
            .on("error", default_callback)
            .connect()
            .await?;
        self.ws_client = Some(ws_client);
        Ok(())
    }

    pub async fn join(&self, room: &str) -> Result<()> {
        self.emit(
            ClientEvent::Join,
            RoomRequest {
                room: room.to_string(),
                username: None,
            },
        )
        .await
    }

    pub async fn leave(&self, room: &str) -> Result<()> {
        self.emit(
            ClientEvent::Leave,
            RoomRequest {
                room: room.to_string(),
                username: None,
            },
        )
        .await
    }

    pub async fn say(&self, room: &str, msg: &str) -> Result<()> {
        self.emit(
            ClientEvent::Message,
            ChatRequest {
                room: room.to_string(),
                username: None,
                msg: msg.to_string(),
            },
        )
        .await
    }

    pub async fn call(&self, target_id: Uuid, offer: Value) -> Result<()> {
        self.emit(ClientEvent::CallUser, CallRequest { target_id, offer })
            .await
    }

    pub async fn answer(&self, target_id: Uuid, answer: Value) -> Result<()> {
        self.emit(ClientEvent::AnswerCall, AnswerRequest { target_id, answer })
            .await
    }

    pub async fn ice_candidate(&self, target_id: Uuid, candidate: Value) -> Result<()> {
        self.emit(
            ClientEvent::IceCandidate,
            IceCandidateRequest {
                target_id,
                candidate,
            },
        )
        .await
    }

    /// Text of every chat line received so far, oldest first.
    pub async fn chat_lines(&self) -> Vec<String> {
        self.inbox
            .read()
            .await
            .iter()
            .filter_map(|received| match received {
                Received::Chat(line) => Some(line.data.text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn received(&self) -> Vec<Received> {
        self.inbox.read().await.clone()
    }

    async fn emit<T: Serialize>(&self, event: ClientEvent, payload: T) -> Result<()> {
        let ws_socket = self
            .ws_client
            .as_ref()
            .ok_or_else(|| eyre!("No socket connection"))?;
        ws_socket.emit(event.as_ref(), json!(payload)).await?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(ws_client) = self.ws_client.take() {
            tokio::spawn(async move {
                if let Err(e) = ws_client.disconnect().await {
                    debug!("Failed to disconnect in drop: {:?}", e);
                }
            });
        }
    }
}
