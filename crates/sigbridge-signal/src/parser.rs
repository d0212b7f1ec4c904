//! Trading-signal parser.
//!
//! Total over its input: malformed, ambiguous, and out-of-range text all
//! yield `None`, never an error. The branch taken is reported through
//! `tracing` for the operator log.

use std::sync::LazyLock;

use chrono::{DateTime, Timelike, Utc};
use regex::Regex;

use sigbridge_core::time::MarketClock;
use sigbridge_core::types::{Directive, Trend};

use crate::timing;

/// `H[:.]MM` with optional space before the minutes, then a trend letter.
static TIME_WITH_TREND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})[:.]\s*(\d{2})\s+([SB])").expect("time+trend pattern compiles")
});

/// Strict variant: no whitespace between the separator and the minutes.
static TIME_WITH_TREND_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2})[:.](\d{2})\s+([SB])").expect("strict time+trend pattern compiles")
});

/// The entire message is a single trend letter.
static SIMPLE_TREND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([SB])$").expect("simple trend pattern compiles"));

/// Parse a trading signal from raw message text.
///
/// `arrived_at` anchors two things: the seconds field of an explicit-time
/// signal, and the inferred execution time of a bare trend. A bare trend
/// without an arrival instant cannot be scheduled and is rejected.
pub fn parse_signal(
    text: &str,
    arrived_at: Option<DateTime<Utc>>,
    clock: &MarketClock,
) -> Option<Directive> {
    let normalized = text.trim().to_uppercase();
    tracing::debug!("🔍 parsing signal candidate: '{normalized}'");

    let arrived_local = arrived_at.map(|instant| clock.to_local(instant));

    // Composite messages are always rejected, never split.
    if TIME_WITH_TREND.find_iter(&normalized).count() > 1 {
        tracing::info!("⚠️ multiple signals in one message, ignoring");
        return None;
    }

    let explicit = TIME_WITH_TREND
        .captures(&normalized)
        .or_else(|| TIME_WITH_TREND_STRICT.captures(&normalized));

    if let Some(caps) = explicit {
        let hour: u8 = caps[1].parse().ok()?;
        let minute: u8 = caps[2].parse().ok()?;

        if hour > 23 || minute > 59 {
            tracing::info!("⚠️ invalid time {hour}:{minute}, ignoring");
            return None;
        }

        let second = arrived_local.map_or(0, |local| local.second() as u8);
        let trend = trend_from_letter(&caps[3]);

        tracing::info!(
            "✅ parsed: {hour:02}:{minute:02}:{second:02} {}",
            trend.as_str().to_uppercase()
        );

        return Some(Directive {
            trend,
            hour,
            minute,
            second,
            time_was_inferred: false,
            source_text: text.to_string(),
            parsed_at: Utc::now(),
        });
    }

    if let Some(caps) = SIMPLE_TREND.captures(&normalized) {
        let trend = trend_from_letter(&caps[1]);

        let Some(local) = arrived_local else {
            tracing::info!("⚠️ bare trend with no arrival instant, cannot schedule");
            return None;
        };

        let (hour, minute, second) = timing::execution_time(&local);
        tracing::info!(
            "🕐 auto-time: {hour:02}:{minute:02}:{second:02} (received at {})",
            local.format("%H:%M:%S")
        );

        return Some(Directive {
            trend,
            hour,
            minute,
            second,
            time_was_inferred: true,
            source_text: text.to_string(),
            parsed_at: Utc::now(),
        });
    }

    tracing::debug!("❌ no signal pattern matched");
    None
}

fn trend_from_letter(letter: &str) -> Trend {
    if letter.eq_ignore_ascii_case("S") {
        Trend::Put
    } else {
        Trend::Call
    }
}
