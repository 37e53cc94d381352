use std::sync::Arc;

use eyre::{ensure, Result};
use log::info;
use qrcode::render::svg;
use qrcode::QrCode;
use sqlx::types::Uuid;
use tap::TapFallible;

use types::domain::Account;
use types::error::Error;

use crate::repository::accounts::AccountRepository;

#[derive(Clone)]
pub struct BankService {
    pub account_repository: Arc<AccountRepository>,
    pub opening_balance: i64,
}

impl BankService {
    pub async fn ensure_account(&self, user_id: Uuid) -> Result<Account> {
        self.account_repository
            .ensure(user_id, self.opening_balance)
            .await
    }

    pub async fn get_account(&self, user_id: Uuid) -> Result<Option<Account>> {
        self.account_repository.get(user_id).await
    }

    pub async fn transfer(
        &self,
        sender_id: Uuid,
        receiver_token: String,
        amount: i64,
    ) -> Result<Account> {
        ensure!(amount > 0, Error::InvalidAmount);
        self.ensure_account(sender_id).await?;
        self.account_repository
            .transfer(sender_id, receiver_token.clone(), amount)
            .await
            .tap_ok(|_| {
                info!(
                    "User {} transferred {} to {}",
                    sender_id, amount, receiver_token
                )
            })
    }

    pub async fn qr_code(&self, user_id: Uuid) -> Result<Option<String>> {
        match self.get_account(user_id).await? {
            Some(account) => Ok(Some(render_qr(&account.token)?)),
            None => Ok(None),
        }
    }
}

pub fn render_qr(token: &str) -> Result<String> {
    let code = QrCode::new(token.as_bytes())?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .build())
}
