use bcrypt::{hash, verify, DEFAULT_COST};
use eyre::{ensure, ContextCompat, Result};
use sqlx::types::Uuid;

use crate::domain::auth::AuthUser;
use crate::repository::auth::AuthUserRepository;
use types::error::Error;

#[derive(Clone)]
pub struct AuthService {
    pub auth_repository: AuthUserRepository,
}

impl AuthService {
    pub async fn signup(&self, username: String, password: String) -> Result<AuthUser> {
        let hashed_password = hash(password, DEFAULT_COST)?;
        self.auth_repository
            .create_user(username, hashed_password)
            .await?
            .wrap_err(Error::UsernameAlreadyExists)
    }

    pub async fn login(&self, username: String, password: String) -> Result<Uuid> {
        let user = self
            .auth_repository
            .get_by_username(username)
            .await?
            .wrap_err(Error::UserNotFound)?;
        ensure!(
            verify(password, &user.hashed_password)?,
            Error::InvalidPassword
        );
        let token = Uuid::new_v4();
        self.auth_repository
            .set_session_token(user.id, Some(token))
            .await?;

        Ok(token)
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<()> {
        self.auth_repository.set_session_token(user_id, None).await
    }

    pub async fn get_user_by_session_token(&self, token: Uuid) -> Result<Option<AuthUser>> {
        self.auth_repository.get_by_session_token(token).await
    }
}
