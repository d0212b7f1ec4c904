//! Session statistics for signal broadcasting.
//!
//! One accumulator per process, created at start and injected into the
//! fan-out engine. Counters are atomic so concurrent dispatches never lose
//! updates; only the unique-recipient set takes a lock.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use sigbridge_core::types::{RecipientClass, Trend};

/// Process-wide send counters. Mutated by the fan-out engine after each
/// dispatch, read on demand, reset only on explicit operator action.
#[derive(Debug)]
pub struct SessionStats {
    started: Mutex<Instant>,
    total_directives: AtomicU64,
    successful_sends: AtomicU64,
    failed_sends: AtomicU64,
    call_signals: AtomicU64,
    put_signals: AtomicU64,
    end_user_sends: AtomicU64,
    operator_sends: AtomicU64,
    recipients_reached: Mutex<HashSet<String>>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(Instant::now()),
            total_directives: AtomicU64::new(0),
            successful_sends: AtomicU64::new(0),
            failed_sends: AtomicU64::new(0),
            call_signals: AtomicU64::new(0),
            put_signals: AtomicU64::new(0),
            end_user_sends: AtomicU64::new(0),
            operator_sends: AtomicU64::new(0),
            recipients_reached: Mutex::new(HashSet::new()),
        }
    }

    /// Record one per-recipient send outcome.
    pub fn record_send(&self, class: RecipientClass, identifier: &str, succeeded: bool) {
        if succeeded {
            self.successful_sends.fetch_add(1, Ordering::Relaxed);
            match class {
                RecipientClass::EndUser => self.end_user_sends.fetch_add(1, Ordering::Relaxed),
                RecipientClass::Operator => self.operator_sends.fetch_add(1, Ordering::Relaxed),
            };
            self.recipients_reached
                .lock()
                .unwrap()
                .insert(identifier.to_string());
        } else {
            self.failed_sends.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the aggregate for one dispatched directive.
    pub fn record_directive(&self, trend: Trend) {
        self.total_directives.fetch_add(1, Ordering::Relaxed);
        match trend {
            Trend::Call => self.call_signals.fetch_add(1, Ordering::Relaxed),
            Trend::Put => self.put_signals.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn summary(&self) -> StatsSummary {
        let successful = self.successful_sends.load(Ordering::Relaxed);
        let failed = self.failed_sends.load(Ordering::Relaxed);
        let attempts = (successful + failed).max(1);

        StatsSummary {
            uptime_seconds: self.started.lock().unwrap().elapsed().as_secs(),
            total_signals: self.total_directives.load(Ordering::Relaxed),
            successful,
            failed,
            success_rate: format!("{:.1}%", successful as f64 / attempts as f64 * 100.0),
            calls: self.call_signals.load(Ordering::Relaxed),
            puts: self.put_signals.load(Ordering::Relaxed),
            unique_recipients: self.recipients_reached.lock().unwrap().len(),
            end_user_sends: self.end_user_sends.load(Ordering::Relaxed),
            operator_sends: self.operator_sends.load(Ordering::Relaxed),
        }
    }

    /// True when the identifier has received at least one successful send.
    pub fn has_reached(&self, identifier: &str) -> bool {
        self.recipients_reached.lock().unwrap().contains(identifier)
    }

    /// Clear every counter and restart the uptime clock.
    pub fn reset(&self) {
        *self.started.lock().unwrap() = Instant::now();
        self.total_directives.store(0, Ordering::Relaxed);
        self.successful_sends.store(0, Ordering::Relaxed);
        self.failed_sends.store(0, Ordering::Relaxed);
        self.call_signals.store(0, Ordering::Relaxed);
        self.put_signals.store(0, Ordering::Relaxed);
        self.end_user_sends.store(0, Ordering::Relaxed);
        self.operator_sends.store(0, Ordering::Relaxed);
        self.recipients_reached.lock().unwrap().clear();
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-side snapshot of [`SessionStats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub uptime_seconds: u64,
    pub total_signals: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: String,
    pub calls: u64,
    pub puts: u64,
    pub unique_recipients: usize,
    pub end_user_sends: u64,
    pub operator_sends: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_outcomes_split_by_class() {
        let stats = SessionStats::new();
        stats.record_send(RecipientClass::EndUser, "a@example.com", true);
        stats.record_send(RecipientClass::Operator, "ops@example.com", true);
        stats.record_send(RecipientClass::EndUser, "b@example.com", false);

        let summary = stats.summary();
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.end_user_sends, 1);
        assert_eq!(summary.operator_sends, 1);
        assert_eq!(summary.unique_recipients, 2);
        assert!(stats.has_reached("a@example.com"));
        assert!(!stats.has_reached("b@example.com"));
    }

    #[test]
    fn test_unique_recipients_deduplicate() {
        let stats = SessionStats::new();
        stats.record_send(RecipientClass::EndUser, "a@example.com", true);
        stats.record_send(RecipientClass::EndUser, "a@example.com", true);
        assert_eq!(stats.summary().unique_recipients, 1);
        assert_eq!(stats.summary().successful, 2);
    }

    #[test]
    fn test_directive_counts_by_trend() {
        let stats = SessionStats::new();
        stats.record_directive(Trend::Call);
        stats.record_directive(Trend::Call);
        stats.record_directive(Trend::Put);

        let summary = stats.summary();
        assert_eq!(summary.total_signals, 3);
        assert_eq!(summary.calls, 2);
        assert_eq!(summary.puts, 1);
    }

    #[test]
    fn test_success_rate_formatting() {
        let stats = SessionStats::new();
        // No attempts yet — rate reads 0.0%, not NaN.
        assert_eq!(stats.summary().success_rate, "0.0%");

        stats.record_send(RecipientClass::EndUser, "a", true);
        stats.record_send(RecipientClass::EndUser, "b", false);
        stats.record_send(RecipientClass::EndUser, "c", false);
        assert_eq!(stats.summary().success_rate, "33.3%");
    }

    #[test]
    fn test_reset_clears_everything() {
        let stats = SessionStats::new();
        stats.record_directive(Trend::Call);
        stats.record_send(RecipientClass::Operator, "ops@example.com", true);
        stats.reset();

        let summary = stats.summary();
        assert_eq!(summary.total_signals, 0);
        assert_eq!(summary.successful, 0);
        assert_eq!(summary.unique_recipients, 0);
    }
}
