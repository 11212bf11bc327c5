//! Running one `[[servers.http]]` definition.
//!
//! Starting a server is two independent steps: maybe start the inbound
//! listener, then start one webhook worker per destination. Either step can
//! be switched off without affecting the other.

use crate::caller::Caller;
use crate::dispatch::ApiState;
use crate::middleware::{LongPolling, RateLimit};
use crate::server::{BoundServer, HttpServer, ServerState};
use botbridge_config::{EnvLookup, HttpServerConfig, ServerDescriptor};
use botbridge_core::BotServices;
use botbridge_webhook::{WebhookWorker, WorkerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Key of HTTP server definitions under `[servers]`.
pub const HTTP_KIND: &str = "http";

/// Delay before the process exits when the listener cannot bind.
pub const BIND_FAILURE_GRACE: Duration = Duration::from_secs(5);

const HTTP_DEFAULT: &str = r#"[[servers.http]]
# Inbound API listener. Empty host or port 0 also disables it.
enabled = true
host = "127.0.0.1"
port = 5700
# Webhook request timeout in seconds. Values below 5 are raised to 5.
timeout = 5
# Token API callers must present. Empty disables auth.
access_token = ""
# Event filter applied to webhook deliveries
filter = ""
# Deliver events to the post targets below
post_enabled = true

[servers.http.long_polling]
enabled = false
# 0 = unbounded
max_queue_size = 2000

[servers.http.rate_limit]
enabled = false
# Tokens per second
frequency = 1.0
bucket = 1

# [[servers.http.post]]
# url = "http://127.0.0.1:5701/"
# secret = ""
"#;

/// Descriptor for the `http` server kind.
pub fn http_descriptor() -> ServerDescriptor {
    ServerDescriptor {
        name: HTTP_KIND,
        brief: "HTTP API server and webhook delivery",
        default_toml: HTTP_DEFAULT,
        parse_env: http_from_env,
    }
}

fn http_from_env(env: EnvLookup<'_>) -> Option<toml::Value> {
    let config = HttpServerConfig::from_env(env)?;
    match toml::Value::try_from(&config) {
        Ok(node) => Some(node),
        Err(e) => {
            warn!(error = %e, "Could not encode HTTP server from environment");
            None
        }
    }
}

/// Handles to everything one server definition started.
pub struct HttpRuntime {
    listen_addr: Option<SocketAddr>,
    server: Option<(JoinHandle<()>, watch::Receiver<ServerState>)>,
    workers: Vec<JoinHandle<()>>,
}

impl HttpRuntime {
    /// Bound address of the API listener, if one was started.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.listen_addr
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Listener state. A definition without a listener reports `Stopped`.
    pub fn server_state(&self) -> ServerState {
        match &self.server {
            Some((_, state)) => *state.borrow(),
            None => ServerState::Stopped,
        }
    }

    /// Wait for the listener and every worker to finish.
    pub async fn join(self) {
        if let Some((handle, _)) = self.server {
            if let Err(e) = handle.await {
                warn!(error = %e, "HTTP API server task ended abnormally");
            }
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Webhook worker ended abnormally");
            }
        }
    }
}

/// Start one HTTP server definition.
///
/// Returns `None` when the node does not decode. A bind failure is fatal:
/// it is logged and the process exits after [`BIND_FAILURE_GRACE`].
pub async fn run_http(
    services: &BotServices,
    node: toml::Value,
    shutdown: watch::Receiver<bool>,
) -> Option<HttpRuntime> {
    let conf = match HttpServerConfig::decode(node) {
        Ok(conf) => conf,
        Err(e) => {
            warn!(error = %e, "Skipping HTTP server definition");
            return None;
        }
    };

    let mut listen_addr = None;
    let mut server = None;
    match conf.listen_addr() {
        Some(addr) => {
            let bound = bind_or_exit(HttpServer::new(addr, api_state(services, &conf))).await;
            listen_addr = Some(bound.local_addr());
            let state = bound.state();
            let handle = tokio::spawn(bound.serve_until(shutdown_requested(shutdown.clone())));
            server = Some((handle, state));
        }
        None if conf.enabled => info!("HTTP API listener skipped: host or port not set"),
        None => info!("HTTP API listener disabled"),
    }

    let mut workers = Vec::new();
    if conf.post_enabled {
        let api_port = listen_addr.map(|addr| addr.port());
        for target in conf.destinations() {
            let worker_config = WorkerConfig::from_server(&conf, target, services.self_id, api_port);
            match WebhookWorker::new(worker_config, services.filters.clone(), services.quick_ops.clone()) {
                Ok(worker) => workers.push(worker.spawn(services.events.as_ref(), shutdown.clone())),
                Err(e) => warn!(url = %target.url, error = %e, "Failed to start webhook worker"),
            }
        }
    }

    Some(HttpRuntime {
        listen_addr,
        server,
        workers,
    })
}

/// The action caller with the middleware this definition enables.
/// Rate limiting runs before long polling.
fn api_state(services: &BotServices, conf: &HttpServerConfig) -> Arc<ApiState> {
    let mut caller = Caller::new(services.actions.clone());
    if conf.rate_limit.enabled {
        caller.use_middleware(Arc::new(RateLimit::new(
            conf.rate_limit.frequency,
            conf.rate_limit.bucket,
        )));
    }
    if conf.long_polling.enabled {
        caller.use_middleware(LongPolling::new(
            services.events.as_ref(),
            conf.long_polling.max_queue_size,
        ));
    }
    Arc::new(ApiState {
        caller,
        access_token: conf.access_token.clone(),
    })
}

async fn bind_or_exit(server: HttpServer) -> BoundServer {
    let addr = server.addr().to_string();
    match server.bind().await {
        Ok(bound) => bound,
        Err(e) => {
            error!(addr = %addr, error = %e, "HTTP API server failed to start, check whether the port is in use");
            warn!("Exiting in {} seconds", BIND_FAILURE_GRACE.as_secs());
            tokio::time::sleep(BIND_FAILURE_GRACE).await;
            std::process::exit(1);
        }
    }
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
