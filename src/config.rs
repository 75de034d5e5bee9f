//! Environment-driven configuration, read once at startup

use crate::channels::{ChannelParseError, ChannelRegistry};
use crate::llm::LlmConfig;
use crate::posts::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
    #[error("HERALD_CHANNELS: {0}")]
    Channels(#[from] ChannelParseError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub telegram_api_base: Option<String>,
    pub webhook_secret: Option<String>,
    /// Bearer token for the admin API; the API is closed when unset
    pub admin_token: Option<String>,
    pub llm: LlmConfig,
    pub channels: ChannelRegistry,
    pub port: u16,
    pub history_capacity: usize,
    /// Idle sessions are evicted after this long; `None` keeps them forever
    pub session_ttl: Option<Duration>,
    pub scheduler_poll: Duration,
    /// How long finished scheduled posts stay listed
    pub schedule_retention: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let channels = match get("HERALD_CHANNELS") {
            Some(raw) => ChannelRegistry::parse(&raw)?,
            None => ChannelRegistry::default(),
        };

        Ok(Self {
            bot_token,
            telegram_api_base: get("TELEGRAM_API_BASE"),
            webhook_secret: get("TELEGRAM_WEBHOOK_SECRET"),
            admin_token: get("HERALD_ADMIN_TOKEN"),
            llm: LlmConfig {
                gemini_api_key: get("GEMINI_API_KEY"),
                model: get("GEMINI_MODEL"),
                base_url: get("GEMINI_API_BASE"),
            },
            channels,
            port: parse_var(&get, "HERALD_PORT")?.unwrap_or(8000),
            history_capacity: parse_var(&get, "HERALD_HISTORY_CAPACITY")?.unwrap_or(50),
            session_ttl: parse_var(&get, "HERALD_SESSION_TTL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            scheduler_poll: Duration::from_secs(
                parse_var(&get, "HERALD_SCHEDULER_POLL_SECS")?
                    .unwrap_or(30)
                    .max(1),
            ),
            schedule_retention: Duration::from_secs(
                parse_var(&get, "HERALD_SCHEDULE_RETENTION_SECS")?.unwrap_or(86_400),
            ),
            retry: RetryPolicy {
                attempts: parse_var(&get, "HERALD_DELIVERY_ATTEMPTS")?
                    .unwrap_or(3)
                    .max(1),
                base_delay: Duration::from_millis(
                    parse_var(&get, "HERALD_DELIVERY_BACKOFF_MS")?.unwrap_or(500),
                ),
            },
        })
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value })
        })
        .transpose()
}
