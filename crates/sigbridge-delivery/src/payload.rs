//! Push payload construction.

use chrono::Utc;

use sigbridge_core::types::{Directive, SignalPayload};

/// Build the wire payload for one directive. Every value is a string; the
/// FCM data contract accepts nothing else.
pub fn build_payload(directive: &Directive) -> SignalPayload {
    let formatted_message = format!(
        "{} {}",
        directive.formatted_time(),
        directive.trend.letter()
    );

    SignalPayload {
        kind: SignalPayload::KIND.into(),
        trend: directive.trend.as_str().into(),
        hour: directive.hour.to_string(),
        minute: directive.minute.to_string(),
        second: directive.second.to_string(),
        original_message: directive.source_text.clone(),
        formatted_message,
        auto_time_added: directive.time_was_inferred.to_string(),
        parsed_at: directive.parsed_at.to_rfc3339(),
        timestamp: Utc::now().timestamp_millis().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigbridge_core::types::Trend;

    fn directive(trend: Trend, inferred: bool) -> Directive {
        Directive {
            trend,
            hour: 14,
            minute: 9,
            second: 0,
            time_was_inferred: inferred,
            source_text: "S".into(),
            parsed_at: Utc::now(),
        }
    }

    #[test]
    fn test_formatted_message_shape() {
        let payload = build_payload(&directive(Trend::Put, true));
        assert_eq!(payload.formatted_message, "14:09:00 S");
        assert_eq!(payload.trend, "put");
        assert_eq!(payload.kind, "TRADING_SIGNAL");
        assert_eq!(payload.auto_time_added, "true");
    }

    #[test]
    fn test_time_components_are_decimal_strings() {
        let payload = build_payload(&directive(Trend::Call, false));
        assert_eq!(payload.hour, "14");
        assert_eq!(payload.minute, "9");
        assert_eq!(payload.second, "0");
        assert_eq!(payload.auto_time_added, "false");
        // Millisecond epoch timestamp parses back as an integer.
        assert!(payload.timestamp.parse::<i64>().is_ok());
    }
}
