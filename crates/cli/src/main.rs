//! BotBridge CLI: the main entry point.
//!
//! Commands:
//! - `serve` : Run every configured server until Ctrl+C / SIGTERM
//! - `init`  : Write a starter config file
//! - `config`: Show the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "botbridge",
    about = "BotBridge: HTTP API gateway and webhook relay for bots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.botbridge/config.toml)
    #[arg(short, long, global = true, env = "BOTBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API listeners and webhook workers
    Serve,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration (secrets redacted)
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve => commands::serve::run(cli.config).await?,
        Commands::Init { force } => commands::init::run(cli.config, force).await?,
        Commands::Config { path: true } => commands::config_cmd::path(cli.config).await?,
        Commands::Config { path: false } => commands::config_cmd::show(cli.config).await?,
    }

    Ok(())
}
