//! `botbridge config`: Show the effective configuration.

use botbridge_config::{AppConfig, HttpServerConfig};
use botbridge_gateway::HTTP_KIND;
use std::path::PathBuf;

const REDACTED: &str = "[REDACTED]";

pub async fn show(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path.as_deref());
    let config = AppConfig::load(Some(path.as_path()), &super::descriptors())
        .map_err(|e| format!("Failed to load config: {e}"))?;
    println!("# {}", path.display());
    println!("{}", render(&config)?);
    Ok(())
}

pub async fn path(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_path(config_path.as_deref()).display());
    Ok(())
}

/// Render the config as TOML with defaults filled in and secrets masked.
/// Server definitions that fail to decode are listed as comments.
pub fn render(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut servers = Vec::new();
    let mut problems = Vec::new();
    for (i, node) in config.server_nodes(HTTP_KIND).iter().enumerate() {
        match HttpServerConfig::decode(node.clone()) {
            Ok(server) => servers.push(redact(server)),
            Err(e) => problems.push(format!("# servers.{HTTP_KIND}[{i}] skipped: {e}")),
        }
    }

    let mut root = toml::Table::new();
    root.insert("self_id".into(), toml::Value::Integer(config.self_id));
    let mut kinds = toml::Table::new();
    kinds.insert(HTTP_KIND.into(), toml::Value::try_from(&servers)?);
    root.insert("servers".into(), toml::Value::Table(kinds));

    let mut out = toml::to_string_pretty(&root)?;
    for problem in problems {
        out.push_str(&problem);
        out.push('\n');
    }
    Ok(out)
}

fn redact(mut server: HttpServerConfig) -> HttpServerConfig {
    if !server.access_token.is_empty() {
        server.access_token = REDACTED.into();
    }
    for target in &mut server.post {
        if !target.secret.is_empty() {
            target.secret = REDACTED.into();
        }
    }
    server
}
