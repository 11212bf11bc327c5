//! Bot collaborators and a loopback reference bot.
//!
//! [`BotServices`] bundles the four interfaces the bridge consumes. The
//! [`LoopbackBot`] implements all of them in-process: sent messages come
//! back out as `message_sent` events, which makes it useful for local
//! testing of webhook receivers and long-polling clients.

use crate::action::{ActionHandler, ActionResponse, QuickOperationSink};
use crate::event::{BotEvent, EventBus, EventHandler, EventSource};
use crate::filter::{FilterRegistry, FilterSet};
use crate::param::ParamSource;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tracing::{debug, warn};

/// The external bot as seen by the bridge.
#[derive(Clone)]
pub struct BotServices {
    /// Bot account identity, sent to webhook destinations as `X-Self-ID`.
    pub self_id: i64,
    pub actions: Arc<dyn ActionHandler>,
    pub events: Arc<dyn EventSource>,
    pub quick_ops: Arc<dyn QuickOperationSink>,
    pub filters: Arc<dyn FilterRegistry>,
}

impl BotServices {
    /// Wire every collaborator to the same loopback bot.
    pub fn loopback(bot: Arc<LoopbackBot>) -> Self {
        Self {
            self_id: bot.self_id(),
            actions: bot.clone(),
            events: bot.clone(),
            quick_ops: bot.clone(),
            filters: bot.filters.clone(),
        }
    }
}

/// Retcode for unknown actions.
pub const RETCODE_NOT_FOUND: i64 = 1404;
/// Retcode for bad or missing arguments.
pub const RETCODE_BAD_PARAMS: i64 = 1400;

/// An in-process bot that echoes sends back as events.
pub struct LoopbackBot {
    self_id: i64,
    events: EventBus,
    filters: Arc<FilterSet>,
    next_message_id: AtomicI64,
    messages_sent: AtomicU64,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl LoopbackBot {
    pub fn new(self_id: i64) -> Self {
        Self {
            self_id,
            events: EventBus::new(),
            filters: Arc::new(FilterSet::new()),
            next_message_id: AtomicI64::new(1),
            messages_sent: AtomicU64::new(0),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn self_id(&self) -> i64 {
        self.self_id
    }

    /// Filters consulted by webhook workers.
    pub fn filters(&self) -> &Arc<FilterSet> {
        &self.filters
    }

    /// Stamp `time`/`self_id` onto an event body and publish it.
    pub fn emit(&self, mut body: Value) -> crate::Result<usize> {
        if let Value::Object(map) = &mut body {
            map.entry("time")
                .or_insert_with(|| json!(chrono::Utc::now().timestamp()));
            map.entry("self_id").or_insert_with(|| json!(self.self_id));
        }
        let event = BotEvent::new(body)?;
        debug!(post_type = %event.post_type(), "Loopback bot emitting event");
        Ok(self.events.publish(event))
    }

    fn send_message(&self, message_type: &str, target: Value, message: Value) -> Value {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);

        let mut body = json!({
            "post_type": "message_sent",
            "message_type": message_type,
            "message_id": message_id,
            "message": message,
        });
        match message_type {
            "group" => body["group_id"] = target,
            _ => body["user_id"] = target,
        }

        if let Err(e) = self.emit(body) {
            warn!(error = %e, "Failed to emit message_sent event");
        }
        ActionResponse::ok(json!({ "message_id": message_id })).into_value()
    }

    fn handle_send(&self, action: &str, params: &dyn ParamSource) -> Value {
        let message = match params.get("message").to_value() {
            Some(m) => m,
            None => return ActionResponse::failed(RETCODE_BAD_PARAMS, "message is required").into_value(),
        };
        let message_type = match action {
            "send_private_msg" => "private".to_string(),
            "send_group_msg" => "group".to_string(),
            _ => match params.get("message_type").as_str() {
                Some(t) => t.to_string(),
                None if params.get("group_id").exists() => "group".to_string(),
                None => "private".to_string(),
            },
        };
        let target_key = if message_type == "group" { "group_id" } else { "user_id" };
        match params.get(target_key).as_i64() {
            Some(target) => self.send_message(&message_type, json!(target), message),
            None => ActionResponse::failed(RETCODE_BAD_PARAMS, format!("{target_key} is required"))
                .into_value(),
        }
    }
}

#[async_trait]
impl ActionHandler for LoopbackBot {
    async fn call(&self, action: &str, params: &dyn ParamSource) -> Value {
        match action {
            "get_login_info" => ActionResponse::ok(json!({
                "user_id": self.self_id,
                "nickname": "loopback",
            }))
            .into_value(),
            "get_version_info" => ActionResponse::ok(json!({
                "app_name": "botbridge",
                "app_version": env!("CARGO_PKG_VERSION"),
                "protocol_version": "v11",
            }))
            .into_value(),
            "get_status" => ActionResponse::ok(json!({
                "online": true,
                "good": true,
                "stat": {
                    "messages_sent": self.messages_sent.load(Ordering::Relaxed),
                    "uptime_secs": (chrono::Utc::now() - self.started_at).num_seconds(),
                },
            }))
            .into_value(),
            "send_msg" | "send_private_msg" | "send_group_msg" => self.handle_send(action, params),
            "push_event" => match params.get("event").to_value() {
                Some(event) => match self.emit(event) {
                    Ok(delivered) => ActionResponse::ok(json!({ "subscribers": delivered })).into_value(),
                    Err(e) => ActionResponse::failed(RETCODE_BAD_PARAMS, e.to_string()).into_value(),
                },
                None => ActionResponse::failed(RETCODE_BAD_PARAMS, "event is required").into_value(),
            },
            _ => ActionResponse::failed(RETCODE_NOT_FOUND, "API not found").into_value(),
        }
    }
}

#[async_trait]
impl QuickOperationSink for LoopbackBot {
    async fn handle_quick_operation(&self, event: &Value, operation: &Value) {
        if event["post_type"] != "message" {
            debug!("Quick operation ignored for non-message event");
            return;
        }
        let Some(reply) = operation.get("reply").filter(|r| !r.is_null()) else {
            return;
        };
        let message_type = event["message_type"].as_str().unwrap_or("private");
        let target = if message_type == "group" {
            event["group_id"].clone()
        } else {
            event["user_id"].clone()
        };
        self.send_message(message_type, target, reply.clone());
    }
}

impl EventSource for LoopbackBot {
    fn on_event_push(&self, handler: EventHandler) {
        self.events.on_event_push(handler);
    }
}
