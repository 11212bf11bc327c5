//! The inbound HTTP listener and its lifecycle.

use crate::dispatch::{SharedApiState, dispatch};
use crate::error::GatewayError;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, warn};

/// How long open connections get to finish after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Largest request body accepted.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Listener lifecycle, observable through [`HttpServer::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built from a decoded definition, not yet asked to bind.
    Unconfigured,
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

/// Build the router: every method and path goes to the dispatcher.
pub fn build_router(state: SharedApiState) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// A configured but not yet bound listener.
pub struct HttpServer {
    addr: String,
    router: Router,
    state: watch::Sender<ServerState>,
}

impl HttpServer {
    pub fn new(addr: impl Into<String>, api: SharedApiState) -> Self {
        Self {
            addr: addr.into(),
            router: build_router(api),
            state: watch::Sender::new(ServerState::Unconfigured),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Bind the listening socket.
    pub async fn bind(self) -> Result<BoundServer, GatewayError> {
        self.state.send_replace(ServerState::Starting);
        let listener = match TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.send_replace(ServerState::Stopped);
                return Err(GatewayError::Bind {
                    addr: self.addr,
                    source,
                });
            }
        };
        let local_addr = listener.local_addr().map_err(|source| GatewayError::Bind {
            addr: self.addr.clone(),
            source,
        })?;

        self.state.send_replace(ServerState::Listening);
        info!(addr = %local_addr, "HTTP API server listening");
        Ok(BoundServer {
            listener,
            local_addr,
            router: self.router,
            state: self.state,
        })
    }
}

/// A listener that has its socket and is ready to serve.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    state: watch::Sender<ServerState>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    /// Serve until `shutdown` resolves, then drain connections for at most
    /// [`SHUTDOWN_GRACE`]. Connections still open after that are dropped.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (listener, router) = (self.listener, self.router);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut server => {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(addr = %self.local_addr, error = %e, "HTTP API server failed"),
                    Err(e) => error!(addr = %self.local_addr, error = %e, "HTTP API server task failed"),
                }
                self.state.send_replace(ServerState::Stopped);
                return;
            }
            _ = shutdown => {}
        }

        self.state.send_replace(ServerState::ShuttingDown);
        info!(addr = %self.local_addr, "HTTP API server shutting down");
        let _ = stop_tx.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(_) => info!(addr = %self.local_addr, "HTTP API server stopped"),
            Err(_) => {
                warn!(
                    addr = %self.local_addr,
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Graceful shutdown timed out, closing remaining connections"
                );
                server.abort();
            }
        }
        self.state.send_replace(ServerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::Caller;
    use crate::dispatch::ApiState;
    use botbridge_core::LoopbackBot;
    use std::sync::Arc;

    fn api() -> SharedApiState {
        Arc::new(ApiState {
            caller: Caller::new(Arc::new(LoopbackBot::new(10001))),
            access_token: String::new(),
        })
    }

    #[tokio::test]
    async fn serves_then_stops_on_signal() {
        let server = HttpServer::new("127.0.0.1:0", api());
        let mut state = server.state();
        assert_eq!(*state.borrow(), ServerState::Unconfigured);

        let bound = server.bind().await.unwrap();
        assert_eq!(*state.borrow_and_update(), ServerState::Listening);
        let addr = bound.local_addr();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(bound.serve_until(async {
            let _ = stop_rx.await;
        }));

        let body: serde_json::Value = reqwest::get(format!("http://{addr}/get_status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let server = HttpServer::new(addr.clone(), api());
        let state = server.state();
        match server.bind().await {
            Err(GatewayError::Bind { addr: failed, .. }) => assert_eq!(failed, addr),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bind should fail on an occupied port"),
        }
        assert_eq!(*state.borrow(), ServerState::Stopped);
    }
}
