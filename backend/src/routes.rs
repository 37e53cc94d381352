use eyre::{ContextCompat, Result};
use socketioxide::socket::Sid;
use sqlx::types::Uuid;
use validator::Validate;

use types::domain::{Account, LoginRequest, RoomSummary, SignupRequest, TransferRequest, User};
use types::error::Error;

use crate::domain::auth::AuthUser;
use crate::domain::session::Session;
use crate::service::auth::AuthService;
use crate::service::bank::BankService;
use crate::service::realtime::{InboundEvent, RealtimeService};

#[derive(Clone)]
pub struct Api {
    pub auth_service: AuthService,
    pub bank_service: BankService,
    pub realtime_service: RealtimeService,
}

impl Api {
    pub async fn signup(&self, request: SignupRequest) -> Result<User> {
        request
            .validate()
            .map_err(|_| Error::InvalidUsernameOrPassword)?;
        let user = self
            .auth_service
            .signup(request.username, request.password)
            .await?;
        Ok(user.to_user())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Uuid> {
        request
            .validate()
            .map_err(|_| Error::InvalidUsernameOrPassword)?;
        self.auth_service
            .login(request.username, request.password)
            .await
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<()> {
        self.auth_service.logout(user_id).await?;
        self.realtime_service.disconnect_user(user_id);
        Ok(())
    }

    pub async fn get_user_by_session_token(&self, token: Uuid) -> Result<Option<AuthUser>> {
        self.auth_service.get_user_by_session_token(token).await
    }

    pub async fn get_bank(&self, user_id: Uuid) -> Result<Account> {
        self.bank_service.ensure_account(user_id).await
    }

    pub async fn transfer(&self, user_id: Uuid, request: TransferRequest) -> Result<Account> {
        let amount = request.amount()?;
        self.bank_service
            .transfer(user_id, request.target_token, amount)
            .await
    }

    pub async fn get_qr_code(&self, user_id: Uuid) -> Result<String> {
        self.bank_service
            .qr_code(user_id)
            .await?
            .wrap_err(Error::AccountNotFound)
    }

    pub fn get_rooms(&self) -> Vec<RoomSummary> {
        self.realtime_service.rooms()
    }

    pub fn connect(&self, session: &Session, sid: Sid) {
        self.realtime_service.connect(session, sid)
    }

    pub fn disconnect(&self, sid: Sid) {
        self.realtime_service.disconnect(sid)
    }

    pub fn handle_event(&self, sid: Sid, session: &Session, event: InboundEvent) -> Result<()> {
        self.realtime_service.handle(sid, session, event)
    }
}
