//! # SigBridge Signal
//! Turns raw channel text into execution-ready directives: pattern matching,
//! time validation, and inference of an execution instant when the message
//! carries none.

pub mod parser;
pub mod timing;

pub use parser::parse_signal;
