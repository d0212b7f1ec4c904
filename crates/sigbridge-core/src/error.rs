//! Error types shared across SigBridge crates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error for the bridge. Per-recipient delivery failures and
/// stream faults carry their own classified types ([`crate::types::DeliveryFailure`],
/// [`crate::types::StreamFault`]) because they feed counters and retry
/// decisions rather than bubbling up as errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Recipient store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
