//! Server configuration, read once from the environment at start-up.

use std::collections::HashMap;
use std::env;
use std::fmt;

use thiserror::Error;

use crate::domain::account::DEFAULT_BALANCE;

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

#[derive(Clone)]
pub struct Config {
    /// Postgres connection string. May carry credentials, so it is redacted in Debug output.
    pub database_url: String,
    pub bind_host: String,
    pub port: u16,
    pub default_balance: i64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_host", &self.bind_host)
            .field("port", &self.port)
            .field("default_balance", &self.default_balance)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let bind_host = vars
            .get("BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_HOST.to_string());

        let port = parse_or(vars, "PORT", DEFAULT_PORT)?;

        let default_balance = parse_or(vars, "DEFAULT_BALANCE", DEFAULT_BALANCE)?;
        if default_balance < 0 {
            return Err(ConfigError::InvalidValue {
                name: "DEFAULT_BALANCE".to_string(),
                value: default_balance.to_string(),
            });
        }

        Ok(Config {
            database_url,
            bind_host,
            port,
            default_balance,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&vars(&[("DATABASE_URL", "postgres://localhost/sim")]))
            .unwrap();
        assert_eq!(config.database_url, "postgres://localhost/sim");
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.default_balance, 1000);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("DATABASE_URL", "postgres://localhost/sim"),
            ("BIND_HOST", "127.0.0.1"),
            ("PORT", "5000"),
            ("DEFAULT_BALANCE", "100"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert_eq!(config.default_balance, 100);
    }

    #[test]
    fn test_missing_database_url() {
        let error = Config::from_vars(&vars(&[])).unwrap_err();
        assert_eq!(
            error,
            ConfigError::MissingEnvVar("DATABASE_URL".to_string())
        );
    }

    #[rstest::rstest]
    #[case("PORT", "eighty")]
    #[case("PORT", "70000")]
    #[case("DEFAULT_BALANCE", "lots")]
    #[case("DEFAULT_BALANCE", "-1")]
    fn test_invalid_values(#[case] name: &str, #[case] value: &str) {
        let error =
            Config::from_vars(&vars(&[("DATABASE_URL", "postgres://x"), (name, value)]))
                .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { name: n, .. } if n == name));
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config =
            Config::from_vars(&vars(&[("DATABASE_URL", "postgres://user:secret@db/sim")]))
                .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
