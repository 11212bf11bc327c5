//! HTTP server definition: inbound gateway plus outbound webhook targets.

use crate::{ConfigError, EnvLookup};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound webhook requests never time out faster than this.
pub const MIN_POST_TIMEOUT_SECS: u64 = 5;

/// Slowest accepted rate-limit refill, in tokens per second.
pub const MIN_RATE_LIMIT_FREQUENCY: f64 = 0.001;

/// One `[[servers.http]]` entry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Start the inbound listener
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listen host. Empty = no listener.
    #[serde(default)]
    pub host: String,

    /// Listen port. 0 = no listener.
    #[serde(default)]
    pub port: u16,

    /// Outbound per-attempt timeout in seconds (floored at 5)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub long_polling: LongPollingConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Bearer token required from API callers. Empty = auth disabled.
    #[serde(default)]
    pub access_token: String,

    /// Event filter name applied by outbound workers. Empty = no filter.
    #[serde(default)]
    pub filter: String,

    /// Start outbound webhook workers
    #[serde(default = "default_true")]
    pub post_enabled: bool,

    /// Webhook destinations, in order
    #[serde(default)]
    pub post: Vec<PostTarget>,
}

fn default_true() -> bool {
    true
}
fn default_timeout() -> u64 {
    MIN_POST_TIMEOUT_SECS
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: 5700,
            timeout: default_timeout(),
            long_polling: LongPollingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            access_token: String::new(),
            filter: String::new(),
            post_enabled: true,
            post: vec![],
        }
    }
}

impl std::fmt::Debug for HttpServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServerConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("long_polling", &self.long_polling)
            .field("rate_limit", &self.rate_limit)
            .field("access_token", &redact(&self.access_token))
            .field("filter", &self.filter)
            .field("post_enabled", &self.post_enabled)
            .field("post", &self.post)
            .finish()
    }
}

/// A webhook destination.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTarget {
    pub url: String,

    /// HMAC-SHA1 signing key. Empty = unsigned.
    #[serde(default)]
    pub secret: String,
}

impl std::fmt::Debug for PostTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostTarget")
            .field("url", &self.url)
            .field("secret", &redact(&self.secret))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongPollingConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Queued events kept for `get_updates`. 0 = unbounded.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_max_queue_size() -> usize {
    2000
}

impl Default for LongPollingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_queue_size: default_max_queue_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Tokens added per second
    #[serde(default = "default_frequency")]
    pub frequency: f64,

    /// Bucket capacity
    #[serde(default = "default_bucket")]
    pub bucket: u32,
}

fn default_frequency() -> f64 {
    1.0
}
fn default_bucket() -> u32 {
    1
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: default_frequency(),
            bucket: default_bucket(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

impl HttpServerConfig {
    /// Decode a raw server node from the config file.
    pub fn decode(node: toml::Value) -> Result<Self, ConfigError> {
        let config = Self::deserialize(node).map_err(|e| ConfigError::DecodeError {
            server: "http".into(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.enabled {
            let frequency = self.rate_limit.frequency;
            if !frequency.is_finite() || frequency < MIN_RATE_LIMIT_FREQUENCY {
                return Err(ConfigError::ValidationError(format!(
                    "rate_limit.frequency must be a finite value >= {MIN_RATE_LIMIT_FREQUENCY}"
                )));
            }
            if self.rate_limit.bucket == 0 {
                return Err(ConfigError::ValidationError(
                    "rate_limit.bucket must be >= 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// `host:port` when the inbound listener should run.
    pub fn listen_addr(&self) -> Option<String> {
        if !self.enabled || self.host.is_empty() || self.port == 0 {
            return None;
        }
        Some(format!("{}:{}", self.host, self.port))
    }

    /// Per-attempt outbound timeout, never below [`MIN_POST_TIMEOUT_SECS`].
    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(MIN_POST_TIMEOUT_SECS))
    }

    /// Destinations that get a worker: non-empty URLs only.
    pub fn destinations(&self) -> impl Iterator<Item = &PostTarget> {
        self.post.iter().filter(|p| !p.url.is_empty())
    }

    /// Build a server definition from `BOTBRIDGE_HTTP_*` variables.
    ///
    /// Returns `None` unless `BOTBRIDGE_HTTP_PORT` is set.
    pub fn from_env(env: EnvLookup<'_>) -> Option<Self> {
        let port = env("BOTBRIDGE_HTTP_PORT").filter(|p| !p.is_empty())?;

        let mut config = Self {
            host: "0.0.0.0".into(),
            port: 5700,
            access_token: env("BOTBRIDGE_ACCESS_TOKEN").unwrap_or_default(),
            ..Self::default()
        };
        if let Some(disable) = env("BOTBRIDGE_HTTP_DISABLE") {
            config.enabled = !parse_bool(&disable, false);
        }
        if let Some(host) = env("BOTBRIDGE_HTTP_HOST").filter(|h| !h.is_empty()) {
            config.host = host;
        }
        match port.parse::<u16>() {
            Ok(p) if p != 0 => config.port = p,
            _ => tracing::warn!(value = %port, "Ignoring invalid BOTBRIDGE_HTTP_PORT"),
        }
        if let Some(url) = env("BOTBRIDGE_HTTP_POST_URL").filter(|u| !u.is_empty()) {
            config.post.push(PostTarget {
                url,
                secret: env("BOTBRIDGE_HTTP_POST_SECRET").unwrap_or_default(),
            });
        }
        Some(config)
    }
}

/// Lenient boolean parsing for environment values.
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "y" => true,
        "0" | "false" | "no" | "off" | "n" => false,
        _ => default,
    }
}
