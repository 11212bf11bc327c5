//! Action caller with an ordered middleware chain.
//!
//! Middleware runs in registration order. Each one sees the action name and
//! parameters and decides whether to call through via [`Next::run`],
//! answer on its own, or rewrite what comes back.

use async_trait::async_trait;
use botbridge_core::{ActionHandler, ParamSource};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// A layer around the action handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value;
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    handler: &'a dyn ActionHandler,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Call the next middleware, or the handler once the chain is exhausted.
    pub fn run(self, action: &'a str, params: &'a dyn ParamSource) -> BoxFuture<'a, Value> {
        Box::pin(async move {
            match self.rest.split_first() {
                Some((middleware, rest)) => {
                    let next = Next {
                        handler: self.handler,
                        rest,
                    };
                    middleware.handle(action, params, next).await
                }
                None => self.handler.call(action, params).await,
            }
        })
    }
}

/// Dispatches action calls through middleware to the bot.
#[derive(Clone)]
pub struct Caller {
    handler: Arc<dyn ActionHandler>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Caller {
    pub fn new(handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            handler,
            middlewares: Vec::new(),
        }
    }

    /// Append a middleware. Earlier registrations run first.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn middleware_count(&self) -> usize {
        self.middlewares.len()
    }

    pub async fn call(&self, action: &str, params: &dyn ParamSource) -> Value {
        let next = Next {
            handler: self.handler.as_ref(),
            rest: &self.middlewares,
        };
        next.run(action, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Echo;

    #[async_trait]
    impl ActionHandler for Echo {
        async fn call(&self, action: &str, params: &dyn ParamSource) -> Value {
            json!({ "action": action, "x": params.get("x").to_value() })
        }
    }

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value {
            self.log.lock().unwrap().push(self.label);
            next.run(action, params).await
        }
    }

    struct Block;

    #[async_trait]
    impl Middleware for Block {
        async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value {
            if action == "blocked" {
                return json!({"blocked": true});
            }
            next.run(action, params).await
        }
    }

    struct Tag;

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value {
            let mut out = next.run(action, params).await;
            out["tagged"] = json!(true);
            out
        }
    }

    #[tokio::test]
    async fn no_middleware_calls_handler() {
        let caller = Caller::new(Arc::new(Echo));
        let out = caller.call("ping", &json!({"x": 1})).await;
        assert_eq!(out, json!({"action": "ping", "x": 1}));
    }

    #[tokio::test]
    async fn middleware_runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut caller = Caller::new(Arc::new(Echo));
        for label in ["first", "second", "third"] {
            caller.use_middleware(Arc::new(Record {
                label,
                log: log.clone(),
            }));
        }
        caller.call("ping", &json!({})).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(caller.middleware_count(), 3);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut caller = Caller::new(Arc::new(Echo));
        caller.use_middleware(Arc::new(Block));
        caller.use_middleware(Arc::new(Record {
            label: "after",
            log: log.clone(),
        }));

        assert_eq!(caller.call("blocked", &json!({})).await, json!({"blocked": true}));
        assert!(log.lock().unwrap().is_empty());

        let out = caller.call("other", &json!({})).await;
        assert_eq!(out["action"], "other");
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn middleware_can_transform_response() {
        let mut caller = Caller::new(Arc::new(Echo));
        caller.use_middleware(Arc::new(Tag));
        let out = caller.call("ping", &json!({})).await;
        assert_eq!(out["tagged"], true);
        assert_eq!(out["action"], "ping");
    }
}
