//! # SigBridge Delivery
//! Fans a parsed directive out to every current recipient: one isolated send
//! per recipient, aggregate accounting, process-wide session statistics.

pub mod fanout;
pub mod payload;
pub mod stats;

pub use fanout::FanOutEngine;
pub use stats::{SessionStats, StatsSummary};
