use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me", "secret"];

/// Token lifetime cap: one year.
const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

pub struct Config {
    pub secret_key: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret_key = get("JUSTTEXT_SECRET_KEY").unwrap_or_default();
        if secret_key.is_empty() || PLACEHOLDER_SECRETS.contains(&secret_key.as_str()) {
            bail!("JUSTTEXT_SECRET_KEY is unset or still a placeholder");
        }

        let db_path: PathBuf = get("JUSTTEXT_DB_PATH").unwrap_or_else(|| "justtext.db".into()).into();
        let host = get("JUSTTEXT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("JUSTTEXT_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("JUSTTEXT_PORT must be a port number")?;
        let token_ttl_minutes: i64 = get("JUSTTEXT_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("JUSTTEXT_TOKEN_TTL_MINUTES must be an integer")?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&token_ttl_minutes) {
            bail!("JUSTTEXT_TOKEN_TTL_MINUTES must be between 1 and {}", MAX_TOKEN_TTL_MINUTES);
        }

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            secret_key,
            db_path,
            addr,
            token_ttl_minutes,
        })
    }
}
