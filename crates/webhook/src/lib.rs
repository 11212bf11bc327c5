//! Outbound webhook delivery.
//!
//! One [`WebhookWorker`] runs per configured destination. It receives bot
//! events through its own queue, drops the ones its filter rejects, signs
//! and posts the rest with bounded retries, and feeds the destination's
//! JSON reply back to the bot as a quick operation.

pub mod error;
pub mod retry;
pub mod signing;
pub mod worker;

pub use error::DeliveryError;
pub use retry::RetryPolicy;
pub use worker::{DeliveryOutcome, USER_AGENT, WebhookWorker, WorkerConfig};
