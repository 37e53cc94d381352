use eyre::{bail, ensure, ContextCompat, Result};
use log::debug;
use sqlx::types::Uuid;
use sqlx::PgPool;

use types::domain::Account;
use types::error::Error;

use crate::domain::account::{generate_token, settle};

const TOKEN_ATTEMPTS: usize = 5;

/// Persistent account balances. Transfers lock both rows in ascending `user_id`
/// order, so transfers over disjoint accounts never wait on each other and
/// overlapping ones serialize without deadlocking.
#[cfg_attr(test, faux::create)]
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

#[cfg_attr(test, faux::methods)]
impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        AccountRepository { pool }
    }

    /// Returns the user's account, creating it with `opening_balance` if absent.
    ///
    /// Creation is a single `INSERT .. ON CONFLICT DO NOTHING`, so concurrent first
    /// visits create exactly one account. A conflict on the token rather than the
    /// user leaves no row behind and is retried with a fresh token.
    pub async fn ensure(&self, user_id: Uuid, opening_balance: i64) -> Result<Account> {
        for _ in 0..TOKEN_ATTEMPTS {
            let token = generate_token(&mut rand::thread_rng());
            sqlx::query(
                r#"
                INSERT INTO accounts (user_id, token, balance)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&token)
            .bind(opening_balance)
            .execute(&self.pool)
            .await?;

            if let Some(account) = self.get(user_id).await? {
                return Ok(account);
            }
            debug!("Account token {} already taken, retrying", token);
        }
        bail!("Could not allocate an account token for user {}", user_id)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<Account>> {
        sqlx::query_as(
            r#"
            SELECT user_id, token, balance FROM accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn get_by_token(&self, token: String) -> Result<Option<Account>> {
        sqlx::query_as(
            r#"
            SELECT user_id, token, balance FROM accounts
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Moves `amount` from the sender's account to the account owning `receiver_token`
    /// and returns the sender's account afterwards. Nothing is written unless both
    /// balances change.
    pub async fn transfer(
        &self,
        sender_id: Uuid,
        receiver_token: String,
        amount: i64,
    ) -> Result<Account> {
        ensure!(amount > 0, Error::InvalidAmount);
        // dropping `tx` on any early return rolls it back
        let mut tx = self.pool.begin().await?;

        let receiver_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM accounts
            WHERE token = $1
            "#,
        )
        .bind(&receiver_token)
        .fetch_optional(&mut *tx)
        .await?;
        let receiver_id = receiver_id.wrap_err(Error::AccountNotFound)?;
        ensure!(receiver_id != sender_id, Error::SelfTransfer);

        let mut locked: Vec<Account> = sqlx::query_as(
            r#"
            SELECT user_id, token, balance FROM accounts
            WHERE user_id = ANY($1)
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(vec![sender_id, receiver_id])
        .fetch_all(&mut *tx)
        .await?;

        let mut sender = take_account(&mut locked, sender_id)
            .wrap_err_with(|| format!("User {} has no account", sender_id))?;
        let mut receiver = take_account(&mut locked, receiver_id).wrap_err(Error::AccountNotFound)?;
        settle(&mut sender, &mut receiver, amount)?;

        for account in [&sender, &receiver] {
            sqlx::query(
                r#"
                UPDATE accounts
                SET balance = $1
                WHERE user_id = $2
                "#,
            )
            .bind(account.balance)
            .bind(account.user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(sender)
    }
}

fn take_account(accounts: &mut Vec<Account>, user_id: Uuid) -> Option<Account> {
    accounts
        .iter()
        .position(|account| account.user_id == user_id)
        .map(|index| accounts.swap_remove(index))
}
