//! Bot events and the push-style event source.
//!
//! The bot produces events (messages, notices, heartbeats). Each event is
//! immutable once built and carries its canonical JSON serialization so
//! every consumer signs and sends exactly the same bytes.

use crate::error::{EventError, Result};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// A single event emitted by the bot.
#[derive(Debug, Clone, PartialEq)]
pub struct BotEvent {
    value: Value,
    raw: String,
}

impl BotEvent {
    /// Build an event from a JSON object. The object must carry a `post_type`.
    pub fn new(value: Value) -> Result<Self> {
        let object = match &value {
            Value::Object(map) => map,
            other => return Err(EventError::NotAnObject(json_kind(other)).into()),
        };
        if !object.contains_key("post_type") {
            return Err(EventError::MissingField("post_type").into());
        }
        let raw = serde_json::to_string(&value)?;
        Ok(Self { value, raw })
    }

    /// Parse an event from its wire form.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::new(value)
    }

    /// The parsed JSON form.
    pub fn json(&self) -> &Value {
        &self.value
    }

    /// Canonical serialization as bytes.
    pub fn json_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// Canonical serialization as a string.
    pub fn json_string(&self) -> &str {
        &self.raw
    }

    /// The `post_type` discriminator (`message`, `notice`, `meta_event`, ...).
    pub fn post_type(&self) -> &str {
        self.value["post_type"].as_str().unwrap_or_default()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Callback invoked once per emitted event.
pub type EventHandler = Box<dyn Fn(Arc<BotEvent>) + Send + Sync>;

/// Anything that pushes bot events to registered callbacks.
///
/// Callbacks run synchronously on the emitting context and must not block;
/// consumers that do slow work (webhook delivery) hand the event off to
/// their own task.
pub trait EventSource: Send + Sync {
    fn on_event_push(&self, handler: EventHandler);
}

/// A callback-list event bus.
///
/// Handlers are invoked in registration order for every published event.
pub struct EventBus {
    handlers: RwLock<Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Publish an event to all subscribers. Returns how many were notified.
    pub fn publish(&self, event: BotEvent) -> usize {
        let event = Arc::new(event);
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        for handler in handlers.iter() {
            handler(event.clone());
        }
        handlers.len()
    }

    /// Number of registered callbacks.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for EventBus {
    fn on_event_push(&self, handler: EventHandler) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }
}
