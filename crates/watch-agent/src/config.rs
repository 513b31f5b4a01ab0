use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

/// All environment-driven settings, resolved once at startup and passed down
/// explicitly. Nothing below main reads the environment.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub slack_token: Option<String>,
    pub slack_broadcast_channel: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub storage_connection_string: Option<String>,
    pub storage_container: String,
    /// `WATCH_ENV=local`: filesystem store plus endpoint replay.
    pub local_mode: bool,
    pub local_store_root: String,
    pub invaders_base_url: String,
    pub home_city: String,
    /// Whether a cycle with an empty diff still writes a new baseline.
    pub persist_on_empty_diff: bool,
    pub http_timeout: Duration,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

impl WatchConfig {
    pub fn from_env() -> Result<Self> {
        let local_mode = env::var("WATCH_ENV")
            .map(|v| v.eq_ignore_ascii_case("local"))
            .unwrap_or(false);

        let config = Self {
            slack_token: env_opt("SLACK_TOKEN"),
            slack_broadcast_channel: env::var("SLACK_BROADCAST_CHANNEL")
                .unwrap_or_else(|_| "#general".to_string()),
            telegram_token: env_opt("TELEGRAM_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
            storage_connection_string: env_opt("STORAGE_CONNECTION_STRING"),
            storage_container: env::var("STORAGE_CONTAINER")
                .unwrap_or_else(|_| "history".to_string()),
            local_mode,
            local_store_root: env::var("LOCAL_STORE_ROOT").unwrap_or_else(|_| "files".to_string()),
            invaders_base_url: env::var("INVADERS_BASE_URL")
                .unwrap_or_else(|_| invaders_client::DEFAULT_BASE_URL.to_string()),
            home_city: env::var("HOME_CITY").unwrap_or_else(|_| "Paris".to_string()),
            persist_on_empty_diff: env::var("PERSIST_ON_EMPTY_DIFF")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("PERSIST_ON_EMPTY_DIFF must be true or false")?,
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("HTTP_TIMEOUT_SECS must be an integer")?,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.local_mode && self.storage_connection_string.is_none() {
            anyhow::bail!(
                "STORAGE_CONNECTION_STRING must be set (or WATCH_ENV=local for the filesystem mirror)"
            );
        }
        if self.telegram_token.is_some() != self.telegram_chat_id.is_some() {
            anyhow::bail!("TELEGRAM_TOKEN and TELEGRAM_CHAT_ID must be set together");
        }
        Ok(())
    }
}
