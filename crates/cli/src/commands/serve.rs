//! `botbridge serve`: Run every configured server.

use botbridge_config::AppConfig;
use botbridge_core::{BotServices, LoopbackBot};
use botbridge_gateway::{HTTP_KIND, run_http};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path.as_deref());
    let config = AppConfig::load(Some(path.as_path()), &super::descriptors())
        .map_err(|e| format!("Failed to load config: {e}"))?;

    let bot = Arc::new(LoopbackBot::new(config.self_id));
    let services = BotServices::loopback(bot);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    println!("🌉 BotBridge");
    println!("   Config:  {}", path.display());
    println!("   Self ID: {}", config.self_id);

    let mut runtimes = Vec::new();
    for node in config.server_nodes(HTTP_KIND) {
        if let Some(runtime) = run_http(&services, node.clone(), shutdown_rx.clone()).await {
            match runtime.listen_addr() {
                Some(addr) => println!("   API:     http://{addr}/"),
                None => println!("   API:     (no listener)"),
            }
            println!("   Webhook workers: {}", runtime.worker_count());
            runtimes.push(runtime);
        }
    }
    if runtimes.is_empty() {
        warn!("No HTTP servers configured; run `botbridge init` to create a config");
    }

    shutdown_signal().await;
    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    for runtime in runtimes {
        runtime.join().await;
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
