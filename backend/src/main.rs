use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use eyre::Result;
use log::{debug, error, info, warn};
use refinery::config::Config as MigrationConfig;
use socketioxide::extract::Extension as SocketExtension;
use socketioxide::extract::{Data, HttpExtension, TryData};
use socketioxide::{extract::SocketRef, SocketIo};
use sqlx::types::Uuid;
use sqlx::PgPool;
use strum::IntoEnumIterator;

use crate::config::Config;
use crate::domain::session::Session;
use crate::extensions::Authenticated;
use crate::outbound::{SocketIoOutbound, NAMESPACE};
use crate::repository::accounts::AccountRepository;
use crate::repository::auth::AuthUserRepository;
use crate::routes::Api;
use crate::service::auth::AuthService;
use crate::service::bank::BankService;
use crate::service::realtime::{InboundEvent, RealtimeService};
use types::domain::{
    AnswerRequest, CallRequest, ChatRequest, ClientEvent, IceCandidateRequest, LoginRequest,
    RoomRequest, ServerEvent, SignupRequest, SocketAuth, TransferRequest,
};
use types::error::Error;

mod config;
mod domain;
mod extensions;
mod outbound;
mod repository;
mod routes;
mod service;

refinery::embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    // setup log
    env_logger::init();
    let config = Config::from_env()?;
    info!("server starts with {:?}", config);

    // run migrations
    let mut migration_config = MigrationConfig::from_str(&config.database_url)?;
    migrations::runner().run_async(&mut migration_config).await?;
    let pool = PgPool::connect(&config.database_url).await?;

    // repositories
    let auth_repository = AuthUserRepository::new(pool.clone());
    let account_repository = Arc::new(AccountRepository::new(pool.clone()));

    // setting up websocket
    let (socket_layer, io) = SocketIo::new_layer();
    io.ns(NAMESPACE, connection_handler);

    // API
    let api = Api {
        auth_service: AuthService { auth_repository },
        bank_service: BankService {
            account_repository,
            opening_balance: config.default_balance,
        },
        realtime_service: RealtimeService::new(Arc::new(SocketIoOutbound::new(io))),
    };

    // routes
    let router = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile))
        .route("/bank", get(get_bank))
        .route("/bank/transfer", post(transfer))
        .route("/bank/qr/{user_id}", get(get_qr_code))
        .route("/rooms", get(get_rooms))
        .layer(socket_layer)
        .layer(Extension(api));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("listening on {}", config.bind_address());
    axum::serve(listener, router).await?;
    Ok(())
}

async fn signup(
    Extension(api): Extension<Api>,
    Json(payload): Json<SignupRequest>,
) -> impl IntoResponse {
    match api.signup(payload).await {
        Ok(user) => (StatusCode::CREATED, Json(user)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn login(
    Extension(api): Extension<Api>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    match api.login(payload).await {
        Ok(token) => (StatusCode::OK, token.to_string()),
        Err(e) => report_into_response(e),
    }
}

async fn logout(
    Authenticated(user): Authenticated,
    Extension(api): Extension<Api>,
) -> impl IntoResponse {
    match api.logout(user.id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn get_profile(Authenticated(user): Authenticated) -> impl IntoResponse {
    (StatusCode::OK, Json(user))
}

async fn get_bank(
    Extension(api): Extension<Api>,
    Authenticated(user): Authenticated,
) -> impl IntoResponse {
    match api.get_bank(user.id).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn transfer(
    Authenticated(user): Authenticated,
    Extension(api): Extension<Api>,
    Form(payload): Form<TransferRequest>,
) -> impl IntoResponse {
    match api.transfer(user.id, payload).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn get_qr_code(
    Extension(api): Extension<Api>,
    Authenticated(_caller): Authenticated,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    match api.get_qr_code(user_id).await {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => report_into_response(e).into_response(),
    }
}

async fn get_rooms(
    Extension(api): Extension<Api>,
    Authenticated(_user): Authenticated,
) -> impl IntoResponse {
    (StatusCode::OK, Json(api.get_rooms())).into_response()
}

async fn join_room(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<RoomRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::Join(request));
}

async fn leave_room(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<RoomRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::Leave(request));
}

async fn send_message(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<ChatRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::Message(request));
}

async fn call_user(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<CallRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::CallUser(request));
}

async fn answer_call(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<AnswerRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::AnswerCall(request));
}

async fn ice_candidate(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    Data(request): Data<IceCandidateRequest>,
    HttpExtension(api): HttpExtension<Api>,
) {
    dispatch(&s, &session, &api, InboundEvent::IceCandidate(request));
}

fn dispatch(s: &SocketRef, session: &Session, api: &Api, event: InboundEvent) {
    let kind = event.kind();
    debug!("User {} sent {}", session.user_id, kind.as_ref());
    if let Err(e) = api.handle_event(s.id, session, event) {
        let (_, message) = report_into_response(e);
        let _ = s.emit(ServerEvent::ServiceError, &message);
    }
}

// every client event gets exactly one handler
fn register_handler(s: &SocketRef, event: ClientEvent) {
    match event {
        ClientEvent::Join => s.on(event, join_room),
        ClientEvent::Leave => s.on(event, leave_room),
        ClientEvent::Message => s.on(event, send_message),
        ClientEvent::CallUser => s.on(event, call_user),
        ClientEvent::AnswerCall => s.on(event, answer_call),
        ClientEvent::IceCandidate => s.on(event, ice_candidate),
    }
}

async fn handle_disconnect(
    s: SocketRef,
    SocketExtension(session): SocketExtension<Session>,
    HttpExtension(api): HttpExtension<Api>,
) {
    debug!("User {} disconnected from {}", session.user_id, s.id);
    api.disconnect(s.id);
}

async fn connection_handler(
    s: SocketRef,
    TryData(auth): TryData<SocketAuth>,
    HttpExtension(api): HttpExtension<Api>,
) {
    let token = match auth {
        Ok(auth) => auth.token,
        Err(e) => {
            warn!("Rejecting socket {}: bad auth payload: {:?}", s.id, e);
            let _ = s.disconnect();
            return;
        }
    };
    let user = match api.get_user_by_session_token(token).await {
        Ok(Some(auth_user)) => auth_user,
        Ok(None) => {
            warn!("Rejecting socket {}: unknown session token", s.id);
            let _ = s.disconnect();
            return;
        }
        Err(e) => {
            error!("Failed to get user from token: {:?}", e);
            let _ = s.disconnect();
            return;
        }
    };
    let session = Session::new(user.id, user.username);
    api.connect(&session, s.id);
    s.extensions.insert(session);
    for event in ClientEvent::iter() {
        register_handler(&s, event);
    }
    s.on_disconnect(handle_disconnect);
}

fn report_into_response(e: eyre::Report) -> (StatusCode, String) {
    match e.downcast::<Error>() {
        Ok(error) => {
            warn!("Request rejected: {}", error);
            error.into_response_tuple()
        }
        Err(e) => {
            error!("Error occurred: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "".to_string())
        }
    }
}
