//! Built-in middleware: token-bucket rate limiting and long polling.

pub mod long_polling;
pub mod rate_limit;

pub use long_polling::LongPolling;
pub use rate_limit::RateLimit;
