//! HTTP API gateway for BotBridge.
//!
//! Accepts action calls over HTTP on any path, resolves parameters from JSON
//! bodies, forms and query strings, checks the access token, and dispatches
//! through an ordered middleware chain to the bot. Each server definition
//! also starts its outbound webhook workers.
//!
//! Built on Axum for high performance async HTTP.

pub mod auth;
pub mod caller;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod middleware;
pub mod runtime;
pub mod server;

pub use caller::{Caller, Middleware, Next};
pub use context::RequestContext;
pub use dispatch::{ApiState, SharedApiState};
pub use error::GatewayError;
pub use runtime::{HTTP_KIND, HttpRuntime, http_descriptor, run_http};
pub use server::{BoundServer, HttpServer, ServerState, build_router};
