//! # SigBridge Stream
//! Owns the long-lived message stream: the Telegram long-polling source, the
//! reconnect backoff policy, and the supervisor that drives inbound messages
//! through interpretation and fan-out.

pub mod backoff;
pub mod supervisor;
pub mod telegram;

pub use backoff::Backoff;
pub use supervisor::{ExitReason, Supervisor, SupervisorState};
pub use telegram::TelegramSource;
