//! Action execution and quick-operation feedback.
//!
//! The bot exposes named actions (`send_msg`, `get_status`, ...). Domain
//! errors never surface as transport errors: they travel inside the
//! response document as a `failed` status and a retcode.

use crate::param::ParamSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Executes named actions. Must be safe for concurrent invocation.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn call(&self, action: &str, params: &dyn ParamSource) -> Value;
}

/// Receives the reply a webhook destination sent back for an event.
#[async_trait]
pub trait QuickOperationSink: Send + Sync {
    async fn handle_quick_operation(&self, event: &Value, operation: &Value);
}

/// The response envelope every action returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// `ok` or `failed`
    pub status: String,
    pub retcode: i64,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub wording: String,
}

impl ActionResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: "ok".into(),
            retcode: 0,
            data,
            msg: String::new(),
            wording: String::new(),
        }
    }

    pub fn failed(retcode: i64, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            status: "failed".into(),
            retcode,
            data: Value::Null,
            wording: msg.clone(),
            msg,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    pub fn into_value(self) -> Value {
        json!({
            "status": self.status,
            "retcode": self.retcode,
            "data": self.data,
            "msg": self.msg,
            "wording": self.wording,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope() {
        let v = ActionResponse::ok(json!({"message_id": 1})).into_value();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["retcode"], 0);
        assert_eq!(v["data"]["message_id"], 1);
    }

    #[test]
    fn failed_envelope_parses_back() {
        let v = ActionResponse::failed(1404, "API not found").into_value();
        let parsed: ActionResponse = serde_json::from_value(v).unwrap();
        assert!(!parsed.is_ok());
        assert_eq!(parsed.retcode, 1404);
        assert_eq!(parsed.wording, "API not found");
        assert_eq!(parsed.data, Value::Null);
    }
}
