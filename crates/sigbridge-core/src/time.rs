//! Fixed-offset market clock.
//!
//! Signal times are quoted in the market's wall clock (WIB, UTC+7 by
//! default); the stream delivers UTC instants.

use chrono::{DateTime, FixedOffset, Utc};

/// Converts instants to the market's fixed local offset and back.
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    offset: FixedOffset,
}

impl MarketClock {
    /// Offset outside ±23 hours falls back to WIB.
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(7 * 3600).expect("WIB is a valid offset"));
        Self { offset }
    }

    /// Western Indonesia Time, UTC+7.
    pub fn wib() -> Self {
        Self::new(7)
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn now_local(&self) -> DateTime<FixedOffset> {
        self.to_local(Utc::now())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::wib()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_utc_to_wib() {
        let clock = MarketClock::wib();
        let utc = Utc.with_ymd_and_hms(2026, 3, 1, 8, 20, 28).unwrap();
        let local = clock.to_local(utc);
        assert_eq!(local.hour(), 15);
        assert_eq!(local.minute(), 20);
        assert_eq!(local.second(), 28);
    }

    #[test]
    fn test_wib_day_boundary() {
        let clock = MarketClock::wib();
        let utc = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let local = clock.to_local(utc);
        assert_eq!(local.hour(), 3);
    }

    #[test]
    fn test_out_of_range_offset_falls_back() {
        let clock = MarketClock::new(99);
        assert_eq!(clock.offset(), MarketClock::wib().offset());
    }
}
