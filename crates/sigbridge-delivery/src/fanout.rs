//! Delivery fan-out engine.
//!
//! One notification per recipient, sent concurrently; a failure on one
//! recipient never aborts the rest. The aggregate result is finalized only
//! after every attempt has completed or timed out.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use sigbridge_core::traits::NotificationDispatch;
use sigbridge_core::types::{
    DeliveryFailure, DeliveryOutcome, Directive, FanOutResult, Recipient, RecipientClass,
};

use crate::payload;
use crate::stats::SessionStats;

pub struct FanOutEngine {
    dispatcher: Arc<dyn NotificationDispatch>,
    stats: Arc<SessionStats>,
    /// Per-recipient send ceiling; expiry counts as a transient failure.
    send_timeout: Duration,
}

impl FanOutEngine {
    pub fn new(
        dispatcher: Arc<dyn NotificationDispatch>,
        stats: Arc<SessionStats>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            stats,
            send_timeout,
        }
    }

    /// Send one directive to every recipient and return the aggregate.
    ///
    /// Degrades to an all-zero result on an empty recipient list or a
    /// directive with out-of-bounds time components; neither is an error.
    /// No retries happen here — a failed recipient is counted and left for
    /// the next signal.
    pub async fn dispatch(&self, directive: &Directive, recipients: Vec<Recipient>) -> FanOutResult {
        if !directive.time_in_bounds() {
            tracing::warn!(
                "⚠️ directive with out-of-bounds time {}, refusing dispatch",
                directive.formatted_time()
            );
            return FanOutResult::default();
        }
        if recipients.is_empty() {
            tracing::warn!("⚠️ no recipients to deliver to");
            return FanOutResult::default();
        }

        let payload = payload::build_payload(directive);
        tracing::info!(
            "🚀 sending '{}' to {} recipients",
            payload.formatted_message,
            recipients.len()
        );

        let attempts = recipients.into_iter().map(|recipient| {
            let payload = payload.clone();
            async move {
                let sent = tokio::time::timeout(
                    self.send_timeout,
                    self.dispatcher.send(&recipient, &payload),
                )
                .await;
                let result = match sent {
                    Ok(outcome) => outcome,
                    Err(_) => Err(DeliveryFailure::Transient("send timed out".into())),
                };
                DeliveryOutcome { recipient, result }
            }
        });

        // Join barrier: the aggregate only exists once every attempt settled.
        let outcomes = join_all(attempts).await;

        let mut result = FanOutResult {
            total: outcomes.len(),
            ..FanOutResult::default()
        };

        for outcome in &outcomes {
            let recipient = &outcome.recipient;
            match &outcome.result {
                Ok(()) => {
                    result.succeeded += 1;
                    match recipient.class {
                        RecipientClass::EndUser => result.end_user_succeeded += 1,
                        RecipientClass::Operator => result.operator_succeeded += 1,
                    }
                    tracing::info!(
                        "   ✅ sent to {} ({})",
                        recipient.identifier,
                        recipient.class.as_str()
                    );
                }
                Err(DeliveryFailure::InvalidToken) => {
                    result.failed += 1;
                    tracing::warn!("   ❌ invalid token for {}", recipient.identifier);
                }
                Err(DeliveryFailure::Transient(reason)) => {
                    result.failed += 1;
                    tracing::warn!("   ❌ failed to send to {}: {reason}", recipient.identifier);
                }
            }
            self.stats
                .record_send(recipient.class, &recipient.identifier, outcome.result.is_ok());
        }

        self.stats.record_directive(directive.trend);

        tracing::info!(
            "📊 dispatch complete: {}/{} succeeded, {} failed",
            result.succeeded,
            result.total,
            result.failed
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use sigbridge_core::types::{SignalPayload, Trend};

    /// Outcome keyed on the delivery token: "ok" succeeds, "dead" is an
    /// invalid token, "slow" sleeps past any test timeout, anything else
    /// fails transiently.
    struct ScriptedDispatch;

    #[async_trait]
    impl NotificationDispatch for ScriptedDispatch {
        async fn send(
            &self,
            recipient: &Recipient,
            _payload: &SignalPayload,
        ) -> Result<(), DeliveryFailure> {
            match recipient.delivery_token.as_str() {
                "ok" => Ok(()),
                "dead" => Err(DeliveryFailure::InvalidToken),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
                _ => Err(DeliveryFailure::Transient("backend unavailable".into())),
            }
        }
    }

    fn directive(trend: Trend) -> Directive {
        Directive {
            trend,
            hour: 14,
            minute: 9,
            second: 0,
            time_was_inferred: false,
            source_text: "14:09 B".into(),
            parsed_at: Utc::now(),
        }
    }

    fn recipient(identifier: &str, token: &str, class: RecipientClass) -> Recipient {
        Recipient {
            identifier: identifier.into(),
            delivery_token: token.into(),
            class,
            role: None,
        }
    }

    fn engine(stats: Arc<SessionStats>) -> FanOutEngine {
        FanOutEngine::new(Arc::new(ScriptedDispatch), stats, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_mixed_outcomes_are_isolated() {
        let stats = Arc::new(SessionStats::new());
        let engine = engine(stats.clone());

        let result = engine
            .dispatch(
                &directive(Trend::Call),
                vec![
                    recipient("a@example.com", "ok", RecipientClass::EndUser),
                    recipient("b@example.com", "dead", RecipientClass::EndUser),
                    recipient("c@example.com", "flaky", RecipientClass::Operator),
                ],
            )
            .await;

        assert_eq!(result.total, 3);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.end_user_succeeded, 1);
        assert_eq!(result.operator_succeeded, 0);

        let summary = stats.summary();
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.total_signals, 1);
        assert_eq!(summary.calls, 1);
        assert!(stats.has_reached("a@example.com"));
        assert!(!stats.has_reached("b@example.com"));
    }

    #[tokio::test]
    async fn test_dispatch_twice_doubles_counters() {
        let stats = Arc::new(SessionStats::new());
        let engine = engine(stats.clone());
        let directive = directive(Trend::Put);
        let recipients = || {
            vec![
                recipient("a@example.com", "ok", RecipientClass::EndUser),
                recipient("b@example.com", "dead", RecipientClass::Operator),
            ]
        };

        let first = engine.dispatch(&directive, recipients()).await;
        let second = engine.dispatch(&directive, recipients()).await;
        assert_eq!(first, second);

        // No hidden deduplication: everything exactly doubles.
        let summary = stats.summary();
        assert_eq!(summary.total_signals, 2);
        assert_eq!(summary.puts, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.unique_recipients, 1);
    }

    #[tokio::test]
    async fn test_empty_recipients_yield_zeroed_result() {
        let stats = Arc::new(SessionStats::new());
        let engine = engine(stats.clone());

        let result = engine.dispatch(&directive(Trend::Call), vec![]).await;
        assert_eq!(result, FanOutResult::default());
        assert_eq!(stats.summary().total_signals, 0);
    }

    #[tokio::test]
    async fn test_out_of_bounds_directive_refused() {
        let stats = Arc::new(SessionStats::new());
        let engine = engine(stats.clone());
        let mut bad = directive(Trend::Call);
        bad.hour = 25;

        let result = engine
            .dispatch(&bad, vec![recipient("a@example.com", "ok", RecipientClass::EndUser)])
            .await;
        assert_eq!(result, FanOutResult::default());
        assert_eq!(stats.summary().successful, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient_failure() {
        let stats = Arc::new(SessionStats::new());
        let engine = FanOutEngine::new(
            Arc::new(ScriptedDispatch),
            stats.clone(),
            Duration::from_millis(100),
        );

        let result = engine
            .dispatch(
                &directive(Trend::Call),
                vec![
                    recipient("a@example.com", "ok", RecipientClass::EndUser),
                    recipient("b@example.com", "slow", RecipientClass::EndUser),
                ],
            )
            .await;

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(stats.summary().failed, 1);
    }
}
