//! Configuration file loading and validation
//!
//! The configuration is read once at startup from a TOML file and then passed by
//! value into the pipeline; nothing reads it from ambient global state.
//!
//! ```toml
//! [github]
//! token = "ghp_..."
//! api_url = "https://api.github.com"
//!
//! [store]
//! root = "/var/lib/repo-pulse"
//! stats_collection = "stats"
//! events_collection = "events"
//!
//! [policy]
//! clones = "optional"
//! views = "optional"
//!
//! [retry]
//! max_attempts = 3
//! base_delay = "1s"
//!
//! [traffic]
//! window_days = 14
//!
//! [collector]
//! program = "tokei"
//! timeout = "5m"
//! ```
//!
//! Only `[store] root` is mandatory. The token may instead come from the command line
//! or the `GITHUB_TOKEN` environment variable, and is only needed for stats runs.

use crate::error::{Error, Result};
use crate::facts::hosting::RetryPolicy;
use crate::pipeline::MetricPolicy;
use crate::store::Collections;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use url::Url;

/// Hosting traffic endpoints only keep this many days of history.
pub const MAX_TRAFFIC_WINDOW_DAYS: u32 = 14;

const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    pub store: StoreConfig,

    #[serde(default)]
    pub policy: MetricPolicy,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub traffic: TrafficConfig,

    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    /// Personal access token; needs push access to read traffic
    #[serde(default)]
    pub token: Option<String>,

    /// Base URL of the REST API, for GitHub Enterprise
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Directory under which every repository gets its own tree of documents
    pub root: Utf8PathBuf,

    #[serde(default = "default_stats_collection")]
    pub stats_collection: String,

    #[serde(default = "default_events_collection")]
    pub events_collection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts for a request failing with a transient error, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for every further retry
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficConfig {
    /// Days of clone/view traffic summed into a record, ending today
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    /// Code counter to run; must accept `--output json <path>`
    #[serde(default = "default_collector_program")]
    pub program: String,

    #[serde(default = "default_collector_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_stats_collection() -> String {
    "stats".to_string()
}

fn default_events_collection() -> String {
    "events".to_string()
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> Duration {
    Duration::from_secs(1)
}

const fn default_window_days() -> u32 {
    MAX_TRAFFIC_WINDOW_DAYS
}

fn default_collector_program() -> String {
    "tokei".to_string()
}

const fn default_collector_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            program: default_collector_program(),
            timeout: default_collector_timeout(),
        }
    }
}

impl Config {
    /// Load and validate configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the file if it cannot be read, parsed or validated
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Configuration(format!("could not read '{path}': {e}")))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Configuration(message) => Error::Configuration(format!("'{path}': {message}")),
            other => other,
        })
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the text is not valid configuration
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Configuration(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<platform config dir>/repo-pulse/config.toml`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the platform has no config directory
    pub fn default_path() -> Result<Utf8PathBuf> {
        let dirs = BaseDirs::new().ok_or_else(|| Error::Configuration("could not determine the configuration directory".to_string()))?;
        let path = dirs.config_dir().join("repo-pulse").join("config.toml");

        Utf8PathBuf::from_path_buf(path)
            .map_err(|p| Error::Configuration(format!("configuration path '{}' is not valid UTF-8", p.display())))
    }

    /// Replace the configured token, if `token` is given.
    #[must_use]
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token {
            self.github.token = Some(token);
        }
        self
    }

    /// The hosting API token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no non-empty token was configured
    pub fn token(&self) -> Result<&str> {
        match self.github.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(Error::Configuration(
                "no GitHub token configured; set [github] token, --github-token or GITHUB_TOKEN".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn collections(&self) -> Collections {
        Collections {
            stats: self.store.stats_collection.clone(),
            events: self.store.events_collection.clone(),
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: self.retry.base_delay,
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(token) = &self.github.token
            && token.trim().is_empty()
        {
            return Err(Error::Configuration("[github] token must not be empty".to_string()));
        }

        let _ = Url::parse(&self.github.api_url)
            .map_err(|e| Error::Configuration(format!("[github] api_url '{}' is not a valid URL: {e}", self.github.api_url)))?;

        if self.store.root.as_str().is_empty() {
            return Err(Error::Configuration("[store] root must not be empty".to_string()));
        }

        let stats = self.store.stats_collection.trim();
        let events = self.store.events_collection.trim();
        if stats.is_empty() || events.is_empty() {
            return Err(Error::Configuration("[store] collection names must not be empty".to_string()));
        }
        if stats == events {
            return Err(Error::Configuration(format!(
                "[store] stats_collection and events_collection must differ, both are '{stats}'"
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Configuration("[retry] max_attempts must be at least 1".to_string()));
        }

        if !(1..=MAX_TRAFFIC_WINDOW_DAYS).contains(&self.traffic.window_days) {
            return Err(Error::Configuration(format!(
                "[traffic] window_days must be between 1 and {MAX_TRAFFIC_WINDOW_DAYS}, got {}",
                self.traffic.window_days
            )));
        }

        if self.collector.program.trim().is_empty() {
            return Err(Error::Configuration("[collector] program must not be empty".to_string()));
        }

        Ok(())
    }
}
