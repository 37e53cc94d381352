use eyre::Result;
use sqlx::types::Uuid;
use sqlx::PgPool;

use crate::domain::auth::AuthUser;

#[cfg_attr(test, faux::create)]
#[derive(Clone)]
pub struct AuthUserRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl AuthUserRepository {
    pub fn new(pool: PgPool) -> Self {
        AuthUserRepository { pool }
    }

    /// Inserts a new user. Returns `None` when the username is already taken,
    /// including when a concurrent signup claimed it first.
    pub async fn create_user(
        &self,
        username: String,
        hashed_password: String,
    ) -> Result<Option<AuthUser>> {
        sqlx::query_as(
            r#"
            INSERT INTO users (id, username, hashed_password)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(hashed_password)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn get_by_username(&self, username: String) -> Result<Option<AuthUser>> {
        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_session_token(&self, user_id: Uuid, token: Option<Uuid>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET session_token = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(token)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_session_token(&self, token: Uuid) -> Result<Option<AuthUser>> {
        sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE session_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }
}
