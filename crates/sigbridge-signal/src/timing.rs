//! Execution-time inference for bare trend signals.

use chrono::{DateTime, FixedOffset, Timelike};

/// A bare signal arriving inside the last 30 seconds of a minute skips to
/// the minute after next; acting that close to the boundary risks missing it.
const BOUNDARY_GUARD_SECS: u32 = 30;

/// Compute the wall-clock execution time for a signal with no explicit time.
///
/// Target is always a minute boundary (second = 0): the next minute when at
/// least [`BOUNDARY_GUARD_SECS`] remain in the current one, otherwise two
/// minutes ahead. Minute rollover wraps modulo 60 and hour modulo 24, so the
/// arithmetic composes across the day boundary.
pub fn execution_time(arrived_at: &DateTime<FixedOffset>) -> (u8, u8, u8) {
    let seconds_into_minute = arrived_at.second();
    let remaining = 60 - seconds_into_minute;

    let (hour, minute) = if remaining >= BOUNDARY_GUARD_SECS {
        let minute = (arrived_at.minute() + 1) % 60;
        let hour = (arrived_at.hour() + u32::from(arrived_at.minute() == 59)) % 24;
        (hour, minute)
    } else {
        let minute = (arrived_at.minute() + 2) % 60;
        let hour = (arrived_at.hour() + (arrived_at.minute() + 2) / 60) % 24;
        (hour, minute)
    };

    (hour as u8, minute as u8, 0)
}
