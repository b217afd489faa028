use tokio::sync::mpsc;

use crate::errors::AppError;
use crate::models::Event;

/// Bounded in-process hand-off between webhook handlers and the processor.
///
/// Producers never block: a full queue is surfaced as [`AppError::QueueFull`]
/// so the HTTP layer can answer 503 and let the provider redeliver.
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
}

impl EventQueue {
    /// Create a queue with the given capacity, returning the producer handle
    /// and the consumer end owned by the processor.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Non-blocking enqueue.
    ///
    /// # Errors
    ///
    /// [`AppError::QueueFull`] when the queue is at capacity, or
    /// [`AppError::Internal`] if the processor has shut down and the channel
    /// is closed.
    pub fn try_enqueue(&self, event: Event) -> Result<(), AppError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    trade_id = %event.trade_id,
                    "Event queue full, rejecting with backpressure"
                );
                Err(AppError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::error!(
                    event_id = %event.event_id,
                    "Event queue closed, processor is not running"
                );
                Err(AppError::Internal(anyhow::anyhow!("event queue closed")))
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}
