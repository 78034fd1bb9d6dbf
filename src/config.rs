use std::env;

use anyhow::{bail, Context};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub finnhub_api_key: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Reads configuration from the environment. Secrets have no fallback
    /// values: a missing required variable aborts startup.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            finnhub_api_key: required("FINNHUB_API_KEY")?,
            token_expiry_hours: env::var("TOKEN_EXPIRY_HOURS")
                .ok()
                .map(|v| v.parse().context("TOKEN_EXPIRY_HOURS must be an integer"))
                .transpose()?
                .unwrap_or(1),
            port: env::var("SERVER_PORT")
                .ok()
                .map(|v| v.parse().context("SERVER_PORT must be a port number"))
                .transpose()?
                .unwrap_or(5000),
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|v| !v.is_empty()),
        };

        if config.token_expiry_hours <= 0 {
            bail!("TOKEN_EXPIRY_HOURS must be positive");
        }

        Ok(config)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{name} is not set"),
    }
}
