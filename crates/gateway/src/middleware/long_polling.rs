//! Long polling: clients pull queued events with the `get_updates` action.
//!
//! Events are buffered as they are emitted. A `get_updates` call waits
//! until at least one event is queued (or its `timeout` expires), then
//! drains up to `limit` events. All other actions pass through.

use crate::caller::{Middleware, Next};
use async_trait::async_trait;
use botbridge_core::{ActionResponse, EventSource, ParamSource};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// Action name intercepted by this middleware.
pub const GET_UPDATES: &str = "get_updates";

pub struct LongPolling {
    queue: Mutex<VecDeque<Value>>,
    notify: Notify,
    /// 0 = unbounded
    max_queue_size: usize,
}

impl LongPolling {
    /// Create the middleware and subscribe it to `source`.
    pub fn new(source: &dyn EventSource, max_queue_size: usize) -> Arc<Self> {
        let this = Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            max_queue_size,
        });
        let weak = Arc::downgrade(&this);
        source.on_event_push(Box::new(move |event| {
            if let Some(this) = weak.upgrade() {
                this.push(event.json().clone());
            }
        }));
        this
    }

    fn push(&self, event: Value) {
        {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(event);
            while self.max_queue_size != 0 && queue.len() > self.max_queue_size {
                queue.pop_front();
            }
        }
        self.notify.notify_waiters();
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Take up to `limit` events (all when `limit` is 0). `None` if empty.
    fn drain(&self, limit: usize) -> Option<Vec<Value>> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.is_empty() {
            return None;
        }
        let take = if limit == 0 { queue.len() } else { limit.min(queue.len()) };
        Some(queue.drain(..take).collect())
    }

    /// Wait until events are available and drain them.
    async fn wait_for_events(&self, limit: usize) -> Vec<Value> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(batch) = self.drain(limit) {
                return batch;
            }
            notified.await;
        }
    }

    /// Handle one `get_updates` call.
    pub async fn get_updates(&self, limit: i64, timeout_secs: i64) -> Value {
        let limit = usize::try_from(limit).unwrap_or(0);
        let events = if timeout_secs > 0 {
            let timeout = Duration::from_secs(timeout_secs as u64);
            match tokio::time::timeout(timeout, self.wait_for_events(limit)).await {
                Ok(events) => events,
                Err(_) => {
                    debug!(timeout_secs, "get_updates timed out with no events");
                    Vec::new()
                }
            }
        } else {
            self.wait_for_events(limit).await
        };
        ActionResponse::ok(Value::Array(events)).into_value()
    }
}

#[async_trait]
impl Middleware for LongPolling {
    async fn handle(&self, action: &str, params: &dyn ParamSource, next: Next<'_>) -> Value {
        if action != GET_UPDATES {
            return next.run(action, params).await;
        }
        let limit = params.get("limit").as_i64().unwrap_or(0);
        let timeout = params.get("timeout").as_i64().unwrap_or(0);
        self.get_updates(limit, timeout).await
    }
}
