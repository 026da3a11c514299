use std::str::FromStr;

use anyhow::{Context, Result};

use pssst_crypto::signing::DEFAULT_GRACE_SECS;
use pssst_types::mailbox::DEFAULT_QUOTA;

/// Relay behaviour that the operator can tune. Bind address, store path and
/// key location belong to the server binary.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Quota in bytes given to every new user.
    pub quota: u64,
    pub grace_secs: u64,
    /// Regex a new user name must match.
    pub allow: Option<String>,
    /// Regex a new user name must not match.
    pub deny: Option<String>,
    pub max_body: usize,
    /// Put store error text into 500 bodies.
    pub debug: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            quota: DEFAULT_QUOTA,
            grace_secs: DEFAULT_GRACE_SECS,
            allow: None,
            deny: None,
            max_body: 8 * 1024 * 1024,
            debug: false,
        }
    }
}

impl RelayConfig {
    /// Read `PSSST_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            quota: env_or("PSSST_QUOTA", defaults.quota)?,
            grace_secs: env_or("PSSST_GRACE_SECS", defaults.grace_secs)?,
            allow: env_opt("PSSST_ALLOW"),
            deny: env_opt("PSSST_DENY"),
            max_body: env_or("PSSST_MAX_BODY", defaults.max_body)?,
            debug: env_or("PSSST_DEBUG", defaults.debug)?,
        })
    }
}

/// Parse `name` if it is set, else return `default`.
pub fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", name, raw))
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
