//! Error types for the BotBridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Transport-facing crates (gateway, webhook) carry their own error enums;
//! this one covers the shared domain model.

use thiserror::Error;

/// The top-level error type for core operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Event errors ---
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum EventError {
    #[error("Event payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Event is missing required field: {0}")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_error_displays_correctly() {
        let err = Error::Event(EventError::NotAnObject("array"));
        assert!(err.to_string().contains("JSON object"));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn serialization_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: Error = parse.into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
