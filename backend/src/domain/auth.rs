use std::str::FromStr;

use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Uuid;
use sqlx::FromRow;

use types::domain::{Role, User};

#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub hashed_password: String,
    pub role: String,
    pub session_token: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AuthUser {
    // unknown role text is treated as the least privileged role
    pub fn role(&self) -> Role {
        Role::from_str(&self.role).unwrap_or_default()
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            role: self.role(),
        }
    }
}
