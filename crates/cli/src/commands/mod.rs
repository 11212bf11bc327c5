pub mod config_cmd;
pub mod init;
pub mod serve;

use botbridge_config::{AppConfig, ServerDescriptor};
use std::path::{Path, PathBuf};

/// Every server kind this binary can run.
pub fn descriptors() -> Vec<ServerDescriptor> {
    vec![botbridge_gateway::http_descriptor()]
}

/// The config file in effect: `--config` if given, else the default path.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path)
}
