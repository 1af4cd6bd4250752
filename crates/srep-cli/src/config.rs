//! Client configuration at `~/.srep/config.toml`.
//!
//! Provides the API endpoint, token, and shell retry settings.
//! CLI flags always override config file values.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Where the API lives and how to authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API host, optionally with a port.
    #[serde(default = "default_url")]
    pub url: String,

    /// "https" or "http".
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Bearer token (empty = none).
    #[serde(default)]
    pub token: String,

    /// Lifecycle request timeout in seconds; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            scheme: default_scheme(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// How long `srep shell` waits for a starting play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Connection attempts, counting the first.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Pause between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_url() -> String {
    srep_client::client::DEFAULT_URL.to_string()
}

fn default_scheme() -> String {
    srep_client::client::DEFAULT_SCHEME.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_attempts() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    3000
}

/// `~/.srep/config.toml`, or a relative fallback when there is no home.
pub fn default_path() -> String {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".srep").join("config.toml").to_string_lossy().to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &str) -> Result<Self> {
        let path = Path::new(path);
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save the configuration to a TOML file.
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;

        let path = Path::new(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;

        Ok(())
    }
}
