//! Environment-driven service configuration.
use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:4000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// HMAC secret for signing tokens; also salts password hashes.
    pub secret: String,
    /// When set, issued tokens expire after this long. Unset means tokens
    /// never expire.
    pub token_ttl: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("NOSH_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse()
            .context("parse NOSH_BIND")?;
        let secret = std::env::var("NOSH_SECRET").context("NOSH_SECRET must be set")?;
        let token_ttl = match std::env::var("NOSH_TOKEN_TTL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().context("parse NOSH_TOKEN_TTL_SECS")?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };
        Ok(Self {
            bind_addr,
            secret,
            token_ttl,
        })
    }
}
