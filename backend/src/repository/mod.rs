pub mod accounts;
pub mod auth;
pub mod connections;
pub mod rooms;

#[cfg(test)]
pub async fn test_pool() -> eyre::Result<sqlx::PgPool> {
    use std::str::FromStr;

    let database_url = std::env::var("DATABASE_URL")?;
    let mut config = refinery::config::Config::from_str(&database_url)?;
    crate::migrations::runner().run_async(&mut config).await?;
    Ok(sqlx::PgPool::connect(&database_url).await?)
}
