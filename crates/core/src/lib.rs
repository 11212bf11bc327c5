//! # BotBridge Core
//!
//! Domain types and traits shared by the BotBridge gateway and webhook
//! crates. The bot itself (event source, action executor, quick-operation
//! handling, filter evaluation) is an external collaborator; this crate
//! defines the narrow interfaces the bridge consumes it through.
//!
//! ## Design Philosophy
//!
//! Every collaborator is a trait here. Implementations live with the bot.
//! This enables:
//! - Driving the bridge from any bot client
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod action;
pub mod bot;
pub mod error;
pub mod event;
pub mod filter;
pub mod param;

// Re-export key types at crate root for ergonomics
pub use action::{ActionHandler, ActionResponse, QuickOperationSink};
pub use bot::{BotServices, LoopbackBot};
pub use error::{Error, Result};
pub use event::{BotEvent, EventBus, EventHandler, EventSource};
pub use filter::{EventFilter, FilterRegistry, FilterSet};
pub use param::{Param, ParamSource};
