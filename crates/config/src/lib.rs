//! Configuration loading, validation, and management for BotBridge.
//!
//! Loads configuration from `~/.botbridge/config.toml` with environment
//! variable overrides. Server definitions are kept as raw TOML nodes keyed
//! by server kind; each kind is described by a [`ServerDescriptor`] that the
//! process entry point passes in explicitly.

pub mod http;

pub use http::{HttpServerConfig, LongPollingConfig, PostTarget, RateLimitConfig};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable lookup, injectable for tests.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Describes one kind of server the process knows how to run.
#[derive(Debug, Clone, Copy)]
pub struct ServerDescriptor {
    /// Key under `[servers]`, e.g. `http`
    pub name: &'static str,
    /// One-line description used in generated config files
    pub brief: &'static str,
    /// Commented TOML snippet written by `botbridge init`
    pub default_toml: &'static str,
    /// Build a server node from environment variables, if they are set
    pub parse_env: fn(EnvLookup<'_>) -> Option<toml::Value>,
}

/// The root configuration structure.
///
/// Maps directly to `~/.botbridge/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bot account identity
    #[serde(default)]
    pub self_id: i64,

    /// Server definitions by kind, e.g. `[[servers.http]]`
    #[serde(default)]
    pub servers: BTreeMap<String, Vec<toml::Value>>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .servers
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("AppConfig")
            .field("self_id", &self.self_id)
            .field("servers", &counts)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `path` (or the default path) plus the process
    /// environment.
    ///
    /// - `BOTBRIDGE_SELF_ID` overrides `self_id`
    /// - each descriptor's `parse_env` may replace that kind's server nodes
    pub fn load(
        path: Option<&Path>,
        descriptors: &[ServerDescriptor],
    ) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);
        Self::load_with_env(&path, descriptors, &|key: &str| std::env::var(key).ok())
    }

    /// Load from a specific file with an explicit environment.
    pub fn load_with_env(
        path: &Path,
        descriptors: &[ServerDescriptor],
        env: EnvLookup<'_>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path, descriptors)?;

        if let Some(raw) = env("BOTBRIDGE_SELF_ID") {
            config.self_id = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("BOTBRIDGE_SELF_ID is not an integer: {raw}"))
            })?;
        }

        for descriptor in descriptors {
            if let Some(node) = (descriptor.parse_env)(env) {
                tracing::info!(server = descriptor.name, "Server definition taken from environment");
                config.servers.insert(descriptor.name.to_string(), vec![node]);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without environment
    /// overrides.
    pub fn load_from(path: &Path, descriptors: &[ServerDescriptor]) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.servers.retain(|kind, _| {
            let known = descriptors.iter().any(|d| d.name == kind.as_str());
            if !known {
                tracing::warn!(server = %kind, "Ignoring unknown server kind in config");
            }
            known
        });

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".botbridge")
    }

    /// Get the default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Raw server nodes of one kind, in file order.
    pub fn server_nodes(&self, kind: &str) -> &[toml::Value] {
        self.servers.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.self_id < 0 {
            return Err(ConfigError::ValidationError("self_id must be >= 0".into()));
        }
        for (kind, nodes) in &self.servers {
            if let Some(bad) = nodes.iter().position(|n| !n.is_table()) {
                return Err(ConfigError::ValidationError(format!(
                    "servers.{kind}[{bad}] must be a table"
                )));
            }
        }
        Ok(())
    }

    /// Generate a starter config TOML string (for `init` command).
    pub fn default_toml(descriptors: &[ServerDescriptor]) -> String {
        let mut out = String::from(
            "# BotBridge configuration\n\n# Bot account identity, sent to webhook receivers as X-Self-ID\nself_id = 0\n",
        );
        for descriptor in descriptors {
            out.push_str(&format!("\n# {}\n", descriptor.brief));
            out.push_str(descriptor.default_toml.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to decode {server} server definition: {reason}")]
    DecodeError { server: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE_DEFAULT: &str = r#"[[servers.http]]
host = "127.0.0.1"
port = 5700
"#;

    fn sample_env(env: EnvLookup<'_>) -> Option<toml::Value> {
        let port = env("SAMPLE_PORT")?;
        let mut table = toml::map::Map::new();
        table.insert("port".into(), toml::Value::Integer(port.parse().ok()?));
        Some(toml::Value::Table(table))
    }

    fn descriptors() -> Vec<ServerDescriptor> {
        vec![ServerDescriptor {
            name: "http",
            brief: "Sample HTTP server",
            default_toml: SAMPLE_DEFAULT,
            parse_env: sample_env,
        }]
    }

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"), &descriptors());
        let config = result.unwrap();
        assert_eq!(config.self_id, 0);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn servers_keep_file_order() {
        let file = write_config(
            r#"
self_id = 10001

[[servers.http]]
port = 1

[[servers.http]]
port = 2
"#,
        );
        let config = AppConfig::load_from(file.path(), &descriptors()).unwrap();
        assert_eq!(config.self_id, 10001);
        let nodes = config.server_nodes("http");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["port"].as_integer(), Some(2));
        assert!(config.server_nodes("ws").is_empty());
    }

    #[test]
    fn unknown_server_kinds_dropped() {
        let file = write_config(
            r#"
[[servers.carrier_pigeon]]
speed = 3
"#,
        );
        let config = AppConfig::load_from(file.path(), &descriptors()).unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let file = write_config("self_id = [unterminated");
        assert!(matches!(
            AppConfig::load_from(file.path(), &descriptors()),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_replaces_server_nodes() {
        let file = write_config(
            r#"
[[servers.http]]
port = 1
[[servers.http]]
port = 2
"#,
        );
        let vars: HashMap<&str, &str> =
            [("SAMPLE_PORT", "9000"), ("BOTBRIDGE_SELF_ID", "77")].into();
        let env = |k: &str| vars.get(k).map(|v| v.to_string());
        let config = AppConfig::load_with_env(file.path(), &descriptors(), &env).unwrap();
        assert_eq!(config.self_id, 77);
        let nodes = config.server_nodes("http");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["port"].as_integer(), Some(9000));
    }

    #[test]
    fn bad_self_id_env_rejected() {
        let env = |k: &str| (k == "BOTBRIDGE_SELF_ID").then(|| "abc".to_string());
        let result =
            AppConfig::load_with_env(Path::new("/nonexistent.toml"), &descriptors(), &env);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn default_toml_generation_parses() {
        let toml_str = AppConfig::default_toml(&descriptors());
        assert!(toml_str.contains("Sample HTTP server"));
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server_nodes("http").len(), 1);
    }

    #[test]
    fn debug_hides_server_bodies() {
        let file = write_config(
            r#"
[[servers.http]]
access_token = "hunter2"
"#,
        );
        let config = AppConfig::load_from(file.path(), &descriptors()).unwrap();
        let out = format!("{config:?}");
        assert!(!out.contains("hunter2"));
        assert!(out.contains("http"));
    }
}
