use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Preprod,
    Prod,
    Testing,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dev" => Ok(Environment::Dev),
            "preprod" => Ok(Environment::Preprod),
            "prod" => Ok(Environment::Prod),
            "testing" => Ok(Environment::Testing),
            other => Err(anyhow!("Unexpected value of APP_ENV: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_path: String,
    pub bind_addr: String,
    pub token_ttl_secs: i64,
    pub default_page_size: usize,
}

impl Config {
    /// Read every setting from the environment, defaulting what is unset
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Settings for tests: in-memory database, one hour tokens
    pub fn testing() -> Self {
        Config {
            environment: Environment::Testing,
            database_path: ":memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            token_ttl_secs: 3600,
            default_page_size: crate::pagination::DEFAULT_PAGE_SIZE,
        }
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = try_load(&lookup, "APP_ENV", "dev")?;

        let config = Config {
            environment,
            database_path: try_load(&lookup, "DATABASE_PATH", "customers.db")?,
            bind_addr: try_load(&lookup, "BIND_ADDR", "0.0.0.0:5000")?,
            token_ttl_secs: try_load(&lookup, "TOKEN_TTL_SECS", "84600")?,
            default_page_size: try_load(&lookup, "DEFAULT_PAGE_SIZE", "1000")?,
        };

        if config.token_ttl_secs <= 0 {
            return Err(anyhow!("TOKEN_TTL_SECS must be positive"));
        }
        let expiry = config
            .token_ttl()
            .and_then(|ttl| crate::auth::session_expiry(Utc::now(), ttl));
        if expiry.is_none() {
            return Err(anyhow!(
                "TOKEN_TTL_SECS is too large: {}",
                config.token_ttl_secs
            ));
        }
        if config.default_page_size == 0 {
            return Err(anyhow!("DEFAULT_PAGE_SIZE must be positive"));
        }
        if config.environment == Environment::Prod && config.database_path == ":memory:" {
            warn!("prod environment is running on an in-memory database");
        }

        Ok(config)
    }

    /// `None` when the value does not fit a chrono duration
    pub fn token_ttl(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_seconds(self.token_ttl_secs)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value: {raw}"))
}
