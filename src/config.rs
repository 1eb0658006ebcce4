use crate::error::{RelayError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com";
pub const DEFAULT_REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";
pub const DEFAULT_REPLICATE_MODEL: &str = "black-forest-labs/flux-1.1-pro-ultra";

const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;
const DEFAULT_INTAKE_QUEUE_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: Option<String>,
    pub app_token: Option<String>,
    pub channel_id: Option<String>,
    pub bot_user_id: Option<String>,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub slack: SlackConfig,
    pub replicate: ReplicateConfig,
    pub staging_dir: PathBuf,
    pub download_timeout_secs: u64,
    pub intake_queue_size: usize,
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    non_empty_env(key).and_then(|value| value.parse().ok())
}

fn base_url(value: Option<String>, default: &str) -> String {
    value
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Default for SlackConfig {
    fn default() -> Self {
        SlackConfig {
            bot_token: None,
            app_token: None,
            channel_id: None,
            bot_user_id: None,
            api_base: DEFAULT_SLACK_API_BASE.to_string(),
        }
    }
}

impl SlackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        SlackConfig {
            bot_token: non_empty_env("SLACK_BOT_TOKEN"),
            app_token: non_empty_env("SLACK_APP_TOKEN"),
            channel_id: non_empty_env("SLACK_CHANNEL_ID"),
            bot_user_id: non_empty_env("SLACK_BOT_USER_ID"),
            api_base: base_url(non_empty_env("SLACK_API_BASE"), DEFAULT_SLACK_API_BASE),
        }
    }

    pub fn with_tokens(mut self, bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        self.bot_token = Some(bot_token.into());
        self.app_token = Some(app_token.into());
        self
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_bot_user(mut self, bot_user_id: impl Into<String>) -> Self {
        self.bot_user_id = Some(bot_user_id.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = base_url(Some(api_base.into()), DEFAULT_SLACK_API_BASE);
        self
    }

    pub fn bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| RelayError::ConfigError("SLACK_BOT_TOKEN is required".into()))
    }

    pub fn app_token(&self) -> Result<&str> {
        self.app_token
            .as_deref()
            .ok_or_else(|| RelayError::ConfigError("SLACK_APP_TOKEN is required".into()))
    }

    pub fn channel_id(&self) -> Result<&str> {
        self.channel_id
            .as_deref()
            .ok_or_else(|| RelayError::ConfigError("SLACK_CHANNEL_ID is required".into()))
    }
}

impl Default for ReplicateConfig {
    fn default() -> Self {
        ReplicateConfig {
            api_token: None,
            model: DEFAULT_REPLICATE_MODEL.to_string(),
            api_base: DEFAULT_REPLICATE_API_BASE.to_string(),
            timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ReplicateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        ReplicateConfig {
            api_token: non_empty_env("REPLICATE_API_TOKEN"),
            model: non_empty_env("REPLICATE_MODEL").unwrap_or(defaults.model),
            api_base: base_url(
                non_empty_env("REPLICATE_API_BASE"),
                DEFAULT_REPLICATE_API_BASE,
            ),
            timeout_secs: parsed_env("REPLICATE_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            poll_interval_ms: parsed_env("REPLICATE_POLL_INTERVAL_MS")
                .unwrap_or(defaults.poll_interval_ms),
        }
    }

    pub fn with_credentials(mut self, api_token: impl Into<String>) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = base_url(Some(api_base.into()), DEFAULT_REPLICATE_API_BASE);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn api_token(&self) -> Result<&str> {
        self.api_token
            .as_deref()
            .ok_or_else(|| RelayError::ConfigError("REPLICATE_API_TOKEN is required".into()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Poll cadence, clamped to 200ms..=5s.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(200, 5_000))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            slack: SlackConfig::default(),
            replicate: ReplicateConfig::default(),
            staging_dir: env::temp_dir(),
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            intake_queue_size: DEFAULT_INTAKE_QUEUE_SIZE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Config {
            slack: SlackConfig::from_env(),
            replicate: ReplicateConfig::from_env(),
            staging_dir: non_empty_env("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            download_timeout_secs: parsed_env("DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or(defaults.download_timeout_secs),
            intake_queue_size: parsed_env("INTAKE_QUEUE_SIZE")
                .filter(|size: &usize| *size > 0)
                .unwrap_or(defaults.intake_queue_size),
        }
    }

    pub fn with_slack(mut self, config: SlackConfig) -> Self {
        self.slack = config;
        self
    }

    pub fn with_replicate(mut self, config: ReplicateConfig) -> Self {
        self.replicate = config;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_download_timeout(mut self, timeout_secs: u64) -> Self {
        self.download_timeout_secs = timeout_secs;
        self
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }

    /// Fails on the first missing required setting.
    pub fn validate(&self) -> Result<()> {
        self.slack.bot_token()?;
        self.slack.app_token()?;
        self.slack.channel_id()?;
        self.replicate.api_token()?;
        if !self.replicate.model.contains('/') {
            return Err(RelayError::ConfigError(format!(
                "REPLICATE_MODEL must look like owner/name, got {}",
                self.replicate.model
            )));
        }
        Ok(())
    }
}
