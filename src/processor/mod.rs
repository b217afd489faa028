pub mod retry;
pub mod state_machine;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::sync::{mpsc, watch};

use crate::errors::AppError;
use crate::models::{DeadLetterEvent, DeadLetterStatus, Event, Trade};
use crate::queue::EventQueue;
use crate::store::{DeadLetterStore, StoreError, TradeStore};

pub use retry::RetryPolicy;
pub use state_machine::{apply_event, mark_failed, Outcome};

/// The single consumer of the event queue. Explicitly constructed with owned
/// store handles so tests can run isolated instances; all trade mutations go
/// through this component, which serializes them by being the only writer.
pub struct EventProcessor {
    trades: Arc<dyn TradeStore>,
    dlq: Arc<dyn DeadLetterStore>,
    threshold: Arc<AtomicU32>,
    retry: RetryPolicy,
}

impl EventProcessor {
    pub fn new(
        trades: Arc<dyn TradeStore>,
        dlq: Arc<dyn DeadLetterStore>,
        threshold: Arc<AtomicU32>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            trades,
            dlq,
            threshold,
            retry,
        }
    }

    /// Drain the queue until it closes or shutdown is signalled. The event
    /// in flight always finishes its retry/commit cycle before the loop
    /// exits; one event's failure never terminates the loop.
    pub async fn run(&self, mut rx: mpsc::Receiver<Event>, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Event processor started");

        loop {
            tokio::select! {
                maybe_event = rx.recv() => match maybe_event {
                    Some(event) => self.process(event).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    // A dropped sender counts as a shutdown request.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Event processor stopped");
    }

    /// Process one event to completion: retry-wrapped apply, then either a
    /// trade store commit or a dead-letter entry. Never returns an error to
    /// the loop.
    async fn process(&self, mut event: Event) {
        let start = Instant::now();
        let network = event.network;
        let mut attempt: u32 = 1;

        loop {
            match self.apply(&event).await {
                Ok(outcome) => {
                    self.log_outcome(&event, outcome);
                    counter!("events_processed", "network" => network.as_str()).increment(1);
                    self.resolve_superseded(&event.event_id).await;
                    break;
                }
                Err(e) if self.retry.is_exhausted(attempt) => {
                    event.retry_count = attempt;
                    self.dead_letter(event, &e, attempt).await;
                    break;
                }
                Err(e) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        event_id = %event.event_id,
                        trade_id = %event.trade_id,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "Event processing failed, backing off"
                    );
                    event.retry_count = attempt;
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        histogram!("event_processing_seconds", "network" => network.as_str())
            .record(start.elapsed().as_secs_f64());
    }

    /// One attempt: load-or-create the trade, run the state machine, persist.
    /// Any store error is retryable.
    async fn apply(&self, event: &Event) -> Result<Outcome, StoreError> {
        let mut trade = match self.trades.get_trade(&event.trade_id).await? {
            Some(trade) => trade,
            None => Trade::new(event.trade_id.clone(), Utc::now()),
        };

        let threshold = self.threshold.load(Ordering::Relaxed);
        let outcome = apply_event(&mut trade, event, threshold, Utc::now());

        // A duplicate changes nothing, skip the write.
        if outcome != Outcome::Duplicate {
            self.trades.put_trade(&trade).await?;
        }

        Ok(outcome)
    }

    fn log_outcome(&self, event: &Event, outcome: Outcome) {
        let threshold = self.threshold.load(Ordering::Relaxed);
        match outcome {
            Outcome::Duplicate => tracing::info!(
                event_id = %event.event_id,
                trade_id = %event.trade_id,
                "Duplicate event, already applied"
            ),
            Outcome::Recorded => tracing::info!(
                event_id = %event.event_id,
                trade_id = %event.trade_id,
                confirmations = event.confirmation_count,
                threshold,
                "Confirmation recorded"
            ),
            Outcome::Confirmed => tracing::info!(
                event_id = %event.event_id,
                trade_id = %event.trade_id,
                threshold,
                "Trade confirmed"
            ),
            Outcome::Completed => tracing::info!(
                event_id = %event.event_id,
                trade_id = %event.trade_id,
                "Trade completed"
            ),
            Outcome::TerminalRecorded(status) => tracing::info!(
                event_id = %event.event_id,
                trade_id = %event.trade_id,
                status = status.as_str(),
                "Late event recorded on terminal trade"
            ),
        }
    }

    /// Retries exhausted: park the event durably, then best-effort mark the
    /// trade failed. If the store is what's broken, the failure mark is
    /// logged and skipped; the DLQ entry is the durable record.
    async fn dead_letter(&self, event: Event, error: &StoreError, attempts: u32) {
        tracing::error!(
            event_id = %event.event_id,
            trade_id = %event.trade_id,
            retries = attempts,
            error = %error,
            "Event processing exhausted retries, moving to dead letter queue"
        );

        let network = event.network;
        let trade_id = event.trade_id.clone();
        let entry = DeadLetterEvent::new(event, error.to_string(), attempts, Utc::now());

        if let Err(e) = self.dlq.add(&entry).await {
            // Both stores down. The provider will redeliver; log loudly.
            tracing::error!(
                event_id = %entry.event_id,
                error = %e,
                "FAILED to write dead letter entry, event may be lost until redelivery"
            );
            return;
        }

        counter!("events_dead_lettered", "network" => network.as_str()).increment(1);

        if let Err(e) = self.fail_trade(&trade_id, &entry.error_message).await {
            tracing::warn!(trade_id = %trade_id, error = %e, "Could not mark trade failed");
        }
    }

    async fn fail_trade(&self, trade_id: &str, reason: &str) -> Result<(), StoreError> {
        let Some(mut trade) = self.trades.get_trade(trade_id).await? else {
            return Ok(());
        };

        if mark_failed(&mut trade, reason) {
            self.trades.put_trade(&trade).await?;
            tracing::warn!(trade_id = %trade_id, reason, "Trade marked failed");
        }
        Ok(())
    }

    /// An event that finally committed closes out its DLQ entry. Covers both
    /// `superseded` entries (replayed via the admin API) and entries still
    /// `unresolved` because the supersede mark failed after the re-enqueue,
    /// or because the provider redelivered the underlying transaction.
    async fn resolve_superseded(&self, event_id: &str) {
        match self.dlq.get(event_id).await {
            Ok(Some(entry)) if entry.status != DeadLetterStatus::Resolved => {
                if let Err(e) = self
                    .dlq
                    .mark(event_id, DeadLetterStatus::Resolved, Some("event committed"))
                    .await
                {
                    tracing::warn!(event_id, error = %e, "Could not resolve replayed DLQ entry");
                } else {
                    tracing::info!(event_id, "Dead-lettered event committed, DLQ entry resolved");
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(event_id, error = %e, "DLQ lookup after commit failed");
            }
        }
    }
}

/// Re-enqueue a dead-lettered event with a fresh retry budget and mark the
/// entry `superseded`. It becomes `resolved` only once the replay commits.
///
/// # Errors
///
/// `NotFound` for an unknown event id, `BadRequest` if the entry is already
/// resolved, `QueueFull` if the queue cannot take the event right now.
pub async fn replay_dead_letter(
    dlq: &dyn DeadLetterStore,
    queue: &EventQueue,
    event_id: &str,
) -> Result<(), AppError> {
    let entry = dlq
        .get(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no dead letter entry for {event_id}")))?;

    if entry.status == DeadLetterStatus::Resolved {
        return Err(AppError::BadRequest(format!(
            "dead letter entry {event_id} is already resolved"
        )));
    }

    let mut event = entry.original_event;
    event.retry_count = 0;

    queue.try_enqueue(event)?;
    dlq.mark(event_id, DeadLetterStatus::Superseded, None).await?;

    tracing::info!(event_id, "Dead letter entry replayed onto the queue");
    Ok(())
}
