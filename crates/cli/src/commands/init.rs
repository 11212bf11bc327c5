//! `botbridge init`: Write a starter configuration file.

use botbridge_config::AppConfig;
use std::path::{Path, PathBuf};

pub async fn run(config_path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path.as_deref());

    println!("🌉 BotBridge — Setup");
    if write_default(&path, force)? {
        println!("✅ Created config at: {}", path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your webhook URLs", path.display());
        println!("   2. Run: botbridge serve\n");
    } else {
        println!("⚠️  Config already exists at: {}", path.display());
        println!("   Edit it manually or re-run with --force.\n");
    }
    Ok(())
}

/// Write the default config to `path`. Returns `false` when the file exists
/// and `force` is not set.
pub fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml(&super::descriptors()))?;
    Ok(true)
}
