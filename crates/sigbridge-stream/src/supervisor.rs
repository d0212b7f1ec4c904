//! Stream connection supervisor.
//!
//! Owns the connect → subscribe → listen lifecycle of the message stream and
//! drives every inbound message through interpretation and fan-out. Faults
//! tear the whole connection down; nothing is ever silently resumed without
//! a fresh connect + subscribe cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use sigbridge_core::time::MarketClock;
use sigbridge_core::traits::{RecipientStore, StreamSource};
use sigbridge_core::types::{InboundMessage, RecipientFilter, StreamFault};
use sigbridge_delivery::fanout::FanOutEngine;
use sigbridge_delivery::stats::SessionStats;
use sigbridge_signal::parser;

use crate::backoff::Backoff;

/// Lifecycle states of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Connecting,
    Subscribed,
    Listening,
    Draining,
    Terminated,
}

/// Why the supervisor stopped for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Operator asked us to stop; everything in flight completed first.
    Drained,
    /// Non-retryable stream fault (typically a dead credential). Needs
    /// manual intervention.
    Fatal(String),
    /// The bounded reconnect budget ran out.
    RetriesExhausted,
}

enum RetryDecision {
    Retry,
    Exhausted,
    Stop,
}

pub struct Supervisor<S: StreamSource> {
    source: S,
    store: Arc<dyn RecipientStore>,
    engine: FanOutEngine,
    stats: Arc<SessionStats>,
    clock: MarketClock,
    filter: RecipientFilter,
    /// Ceiling on connect and subscribe; expiry is a retryable fault.
    connect_timeout: Duration,
    state: SupervisorState,
}

impl<S: StreamSource> Supervisor<S> {
    pub fn new(
        source: S,
        store: Arc<dyn RecipientStore>,
        engine: FanOutEngine,
        stats: Arc<SessionStats>,
        clock: MarketClock,
        filter: RecipientFilter,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            engine,
            stats,
            clock,
            filter,
            connect_timeout,
            state: SupervisorState::Disconnected,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Run until drained, a fatal fault, or retry exhaustion. Transient
    /// faults never end the loop; they re-enter it through backoff.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> ExitReason {
        let mut backoff = Backoff::new();

        loop {
            self.state = SupervisorState::Connecting;
            match self.establish().await {
                Ok(()) => backoff.reset(),
                Err(StreamFault::Fatal(reason)) => {
                    tracing::error!("❌ fatal stream fault: {reason}");
                    self.source.disconnect().await;
                    return self.terminate(ExitReason::Fatal(reason));
                }
                Err(fault) => {
                    // Torn down and rebuilt; a half-open connect is never reused.
                    self.source.disconnect().await;
                    self.state = SupervisorState::Disconnected;
                    match self.wait_before_retry(fault, &mut backoff, &mut shutdown).await {
                        RetryDecision::Retry => continue,
                        RetryDecision::Exhausted => {
                            return self.terminate(ExitReason::RetriesExhausted);
                        }
                        RetryDecision::Stop => return self.drain().await,
                    }
                }
            }

            self.state = SupervisorState::Listening;
            tracing::info!("🎧 listening for signals");

            let fault = loop {
                tokio::select! {
                    _ = shutdown.changed() => break None,
                    inbound = self.source.next_message() => match inbound {
                        Ok(message) => self.handle_message(message).await,
                        Err(fault) => break Some(fault),
                    },
                }
            };

            match fault {
                None => return self.drain().await,
                Some(StreamFault::Fatal(reason)) => {
                    tracing::error!("❌ fatal stream fault while listening: {reason}");
                    self.source.disconnect().await;
                    return self.terminate(ExitReason::Fatal(reason));
                }
                Some(fault) => {
                    self.source.disconnect().await;
                    self.state = SupervisorState::Disconnected;
                    match self.wait_before_retry(fault, &mut backoff, &mut shutdown).await {
                        RetryDecision::Retry => {}
                        RetryDecision::Exhausted => {
                            return self.terminate(ExitReason::RetriesExhausted);
                        }
                        RetryDecision::Stop => return self.drain().await,
                    }
                }
            }
        }
    }

    /// Connect + subscribe under the configured ceiling. Subscribed state is
    /// only reached when both succeed.
    async fn establish(&mut self) -> Result<(), StreamFault> {
        match tokio::time::timeout(self.connect_timeout, self.source.connect()).await {
            Err(_) => return Err(StreamFault::Retryable("connect timed out".into())),
            Ok(Err(fault)) => return Err(fault),
            Ok(Ok(())) => {}
        }
        match tokio::time::timeout(self.connect_timeout, self.source.subscribe()).await {
            Err(_) => return Err(StreamFault::Retryable("subscribe timed out".into())),
            Ok(Err(fault)) => return Err(fault),
            Ok(Ok(())) => {}
        }
        self.state = SupervisorState::Subscribed;
        Ok(())
    }

    /// One inbound message: skip textless, interpret, fan out. Handled to
    /// completion before the next message is taken, so a stop request never
    /// interrupts a fan-out mid-pass.
    async fn handle_message(&self, inbound: InboundMessage) {
        let Some(text) = inbound.text.filter(|t| !t.trim().is_empty()) else {
            tracing::debug!("📩 message has no text, skipping");
            return;
        };

        tracing::info!(
            "📩 message at {}: {text}",
            self.clock.to_local(inbound.arrived_at).format("%H:%M:%S")
        );

        let Some(directive) = parser::parse_signal(&text, Some(inbound.arrived_at), &self.clock)
        else {
            tracing::info!("ℹ️ not a trading signal, ignoring");
            return;
        };

        let recipients = match self.store.list_recipients(&self.filter).await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!("❌ failed to fetch recipients: {e}");
                return;
            }
        };

        let result = self.engine.dispatch(&directive, recipients).await;
        tracing::info!(
            "🎯 {} → {}/{} delivered; session: {}",
            directive.formatted_time(),
            result.succeeded,
            result.total,
            summary_line(&self.stats)
        );
    }

    /// Honor a rate-limit pause or sleep the next backoff delay. A stop
    /// request during the sleep wins over the retry.
    async fn wait_before_retry(
        &mut self,
        fault: StreamFault,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> RetryDecision {
        if let StreamFault::RateLimited { retry_after_secs } = fault {
            tracing::warn!("⚠️ rate limited, honoring {retry_after_secs}s server pause");
            tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
            // The server pause replaces the backoff delay; it still spends
            // one attempt from the budget.
            return if backoff.register_attempt() {
                RetryDecision::Retry
            } else {
                tracing::error!("❌ reconnect budget exhausted");
                RetryDecision::Exhausted
            };
        }

        tracing::warn!("⚠️ stream fault: {fault}");
        let Some(delay) = backoff.next_delay() else {
            tracing::error!("❌ reconnect budget exhausted ({} attempts)", Backoff::MAX_RETRIES);
            return RetryDecision::Exhausted;
        };

        tracing::info!(
            "🔄 reconnecting in {:.1}s (attempt {}/{})",
            delay.as_secs_f64(),
            backoff.attempts(),
            Backoff::MAX_RETRIES
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => RetryDecision::Retry,
            _ = shutdown.changed() => RetryDecision::Stop,
        }
    }

    async fn drain(&mut self) -> ExitReason {
        self.state = SupervisorState::Draining;
        tracing::info!("🛑 stop requested, draining");
        self.source.disconnect().await;
        self.terminate(ExitReason::Drained)
    }

    fn terminate(&mut self, reason: ExitReason) -> ExitReason {
        self.state = SupervisorState::Terminated;
        tracing::info!("📊 final statistics: {}", summary_line(&self.stats));
        reason
    }
}

fn summary_line(stats: &SessionStats) -> String {
    serde_json::to_string(&stats.summary()).unwrap_or_else(|_| "<unserializable>".into())
}
