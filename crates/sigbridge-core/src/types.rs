//! Domain types for the signal pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directional intent of a trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Call,
    Put,
}

impl Trend {
    /// Wire value used in push payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Call => "call",
            Trend::Put => "put",
        }
    }

    /// Single-letter form used in formatted messages.
    pub fn letter(&self) -> char {
        match self {
            Trend::Call => 'B',
            Trend::Put => 'S',
        }
    }
}

/// A parsed, execution-ready trading signal.
///
/// A `Directive` is only ever constructed with all three time components
/// present. "Time unknown" is not representable; the parser rejects instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub trend: Trend,
    /// Local wall-clock execution hour (0–23).
    pub hour: u8,
    /// Local wall-clock execution minute (0–59).
    pub minute: u8,
    /// Local wall-clock execution second (0–59).
    pub second: u8,
    /// True when the source text omitted a time and one was inferred.
    pub time_was_inferred: bool,
    /// Original raw text, preserved verbatim for audit and logging.
    pub source_text: String,
    pub parsed_at: DateTime<Utc>,
}

impl Directive {
    /// Execution time as `HH:MM:SS`.
    pub fn formatted_time(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    /// All three time components within calendar bounds.
    pub fn time_in_bounds(&self) -> bool {
        self.hour <= 23 && self.minute <= 59 && self.second <= 59
    }
}

/// Recipient class, used to filter delivery scope and segment statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientClass {
    EndUser,
    Operator,
}

impl RecipientClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientClass::EndUser => "user",
            RecipientClass::Operator => "operator",
        }
    }
}

/// A push-notification recipient.
///
/// Fetched fresh from the directory for every dispatch; a recipient's
/// validity window is exactly one fan-out call. The identifier is a
/// display/log key (usually an email), not a deduplication key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub identifier: String,
    pub delivery_token: String,
    pub class: RecipientClass,
    /// Operator role label, when the directory carries one.
    pub role: Option<String>,
}

/// Delivery scope for a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecipientFilter {
    #[default]
    All,
    EndUsersOnly,
    OperatorsOnly {
        role: Option<String>,
    },
}

/// Why a single recipient send failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The recipient's token is permanently unusable. Remediation belongs to
    /// the recipient directory, not this pipeline.
    InvalidToken,
    /// Any other failure. A later signal is simply attempted fresh.
    Transient(String),
}

/// Per-recipient outcome of one fan-out pass.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub recipient: Recipient,
    pub result: std::result::Result<(), DeliveryFailure>,
}

/// Aggregate result over one directive's dispatch. Produced fresh per
/// dispatch and never mutated after return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub end_user_succeeded: usize,
    pub operator_succeeded: usize,
}

/// One inbound message from the stream transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: Option<String>,
    pub arrived_at: DateTime<Utc>,
}

/// Classified stream-transport fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFault {
    /// Timeout, transient network/server error. The supervisor tears the
    /// connection down and reconnects with backoff.
    Retryable(String),
    /// The transport asked us to wait; honor the server-specified duration.
    RateLimited { retry_after_secs: u64 },
    /// Invalidated credential or similar. No automatic retry.
    Fatal(String),
}

impl std::fmt::Display for StreamFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamFault::Retryable(reason) => write!(f, "retryable: {reason}"),
            StreamFault::RateLimited { retry_after_secs } => {
                write!(f, "rate limited for {retry_after_secs}s")
            }
            StreamFault::Fatal(reason) => write!(f, "fatal: {reason}"),
        }
    }
}

/// Wire payload for one push notification. Every value is a string, per the
/// FCM data-message contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub trend: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
    pub original_message: String,
    /// `HH:MM:SS {B|S}` — what the device displays and acts on.
    pub formatted_message: String,
    pub auto_time_added: String,
    pub parsed_at: String,
    /// Dispatch instant, milliseconds since epoch.
    pub timestamp: String,
}

impl SignalPayload {
    pub const KIND: &'static str = "TRADING_SIGNAL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_wire_forms() {
        assert_eq!(Trend::Call.as_str(), "call");
        assert_eq!(Trend::Put.as_str(), "put");
        assert_eq!(Trend::Call.letter(), 'B');
        assert_eq!(Trend::Put.letter(), 'S');
    }

    #[test]
    fn test_directive_formatted_time() {
        let directive = Directive {
            trend: Trend::Call,
            hour: 9,
            minute: 5,
            second: 0,
            time_was_inferred: false,
            source_text: "9:05 B".into(),
            parsed_at: Utc::now(),
        };
        assert_eq!(directive.formatted_time(), "09:05:00");
        assert!(directive.time_in_bounds());
    }

    #[test]
    fn test_payload_serializes_type_field() {
        let payload = SignalPayload {
            kind: SignalPayload::KIND.into(),
            trend: "call".into(),
            hour: "9".into(),
            minute: "5".into(),
            second: "0".into(),
            original_message: "9:05 B".into(),
            formatted_message: "09:05:00 B".into(),
            auto_time_added: "false".into(),
            parsed_at: "2026-01-01T00:00:00+00:00".into(),
            timestamp: "0".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "TRADING_SIGNAL");
        assert_eq!(json["auto_time_added"], "false");
    }
}
