use std::env;
use std::future::Future;
use std::time::Duration;

use rand::distr::Alphanumeric;
use rand::{rng, Rng};
use tap::TapFallible;

use client::client::{Client, DEFAULT_BASE_URL};
use types::domain::{LoginRequest, SignupRequest};

use crate::domain::TestUser;

pub const PASSWORD: &str = "password";

pub fn base_url() -> String {
    env::var("E2E_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub async fn register_user() -> eyre::Result<TestUser> {
    let mut client = Client::new(base_url());

    let username = random_username();
    let request = SignupRequest {
        username: username.clone(),
        password: PASSWORD.to_string(),
    };
    client.signup(request).await?;

    client
        .login(LoginRequest {
            username,
            password: PASSWORD.to_string(),
        })
        .await
        .tap_err(|e| println!("Error: {:?}", e))?;

    let user = client.get_profile().await?;
    Ok(TestUser { user, client })
}

pub fn random_username() -> String {
    let random_string: String = rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();

    format!("user_{}", random_string)
}

/// Polls `check` until it holds, giving socket traffic time to arrive.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..50 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
