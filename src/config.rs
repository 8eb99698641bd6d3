//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file (`$TGWATCH_CONFIG`, default
//! `./tgwatch.toml`) with every field defaulted. A small set of environment
//! variables overrides the file.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::telegram::gateway::DEFAULT_GATEWAY_URL;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "TGWATCH_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "tgwatch.toml";

/// Environment override for [`Config::channel`].
pub const CHANNEL_ENV: &str = "TGWATCH_CHANNEL";

/// Environment override for [`Config::gateway_url`].
pub const GATEWAY_URL_ENV: &str = "TGWATCH_GATEWAY_URL";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Channel alias to watch.
    pub channel: String,

    /// Base URL of the MTProto gateway.
    pub gateway_url: String,

    /// Where the session blob is persisted.
    pub session_path: PathBuf,

    /// `.env` file holding `API_ID`, `API_HASH` and `PHONE_NUMBER`.
    pub env_file: PathBuf,

    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,

    /// Messages fetched to seed the watermark at startup.
    pub initial_batch: u32,

    /// Messages fetched per poll cycle.
    pub poll_batch: u32,

    /// Upper bound on a single gateway call, in seconds.
    pub request_timeout_secs: u64,

    /// Trailing window of seen ids kept behind the watermark, in seconds.
    /// Zero keeps every id for the life of the process.
    pub seen_retention_secs: u64,

    /// Directory for rotated JSON logs. Console-only logging when unset.
    pub logs_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            session_path: PathBuf::from("session.json"),
            env_file: PathBuf::from(".env"),
            poll_interval_secs: 10,
            initial_batch: 5,
            poll_batch: 100,
            request_timeout_secs: 30,
            seen_retention_secs: 3600,
            logs_dir: None,
        }
    }
}

fn default_channel() -> String {
    "tusa_ton".to_owned()
}

impl Config {
    /// Load configuration from the file named by `$TGWATCH_CONFIG` (or the
    /// default path), then apply environment overrides and validate.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or the
    /// resulting values are invalid.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if explicit.is_some() || path.exists() {
            load_config(&path)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or unknown keys.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(channel) = lookup(CHANNEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.channel = channel.trim().to_owned();
        }
        if let Some(url) = lookup(GATEWAY_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.gateway_url = url.trim().to_owned();
        }
    }

    /// Check that the values can drive a working poller.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.channel.trim_start_matches('@').trim().is_empty() {
            anyhow::bail!("channel must not be empty");
        }
        url::Url::parse(&self.gateway_url)
            .map_err(|e| anyhow::anyhow!("invalid gateway_url {:?}: {e}", self.gateway_url))?;
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if self.initial_batch == 0 || self.poll_batch == 0 {
            anyhow::bail!("initial_batch and poll_batch must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Poll period as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Seen-id retention window, `None` when pruning is disabled.
    pub fn seen_retention(&self) -> Option<i64> {
        if self.seen_retention_secs == 0 {
            return None;
        }
        Some(i64::try_from(self.seen_retention_secs).unwrap_or(i64::MAX))
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}
