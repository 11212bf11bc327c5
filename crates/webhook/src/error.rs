use thiserror::Error;

/// Why a single delivery attempt (or worker setup) failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Destination answered with status {0}")]
    Status(u16),
}
