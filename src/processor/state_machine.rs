use chrono::{DateTime, Utc};

use crate::models::{Event, EventRecord, EventType, Trade, TradeStatus};

/// What applying one event to a trade did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Event id already present in the trade history; nothing changed.
    Duplicate,
    /// Recorded without a state transition (below threshold, or an ordinary
    /// confirmation on an already-confirmed trade).
    Recorded,
    /// Crossed the threshold, `pending → confirmed`.
    Confirmed,
    /// Final confirmation applied in (or together with) `confirmed`,
    /// `confirmed → completed`.
    Completed,
    /// Trade already terminal; event appended to history for audit only.
    TerminalRecorded(TradeStatus),
}

/// Apply one event to a trade, enforcing the confirmation state machine.
///
/// Rules, in order:
/// - re-applying an already-seen `event_id` is a no-op;
/// - every new event is appended to the audit history, terminal or not;
/// - `completed` and `failed` trades change nothing else;
/// - `confirmations` is max-taken and never decreases;
/// - `confirmed_at` is set exactly once, when the stored confirmations first
///   reach `threshold`;
/// - completion requires a `final_confirmation` event applied while the
///   trade is (or just became) `confirmed` — a final event below threshold
///   is recorded and completion is deferred.
pub fn apply_event(
    trade: &mut Trade,
    event: &Event,
    threshold: u32,
    now: DateTime<Utc>,
) -> Outcome {
    if trade.has_event(&event.event_id) {
        return Outcome::Duplicate;
    }

    trade.events.push(EventRecord::from(event));

    if trade.status.is_terminal() {
        return Outcome::TerminalRecorded(trade.status);
    }

    trade.confirmations = trade.confirmations.max(event.confirmation_count);

    let mut outcome = Outcome::Recorded;

    if trade.status == TradeStatus::Pending && trade.confirmations >= threshold {
        trade.status = TradeStatus::Confirmed;
        if trade.confirmed_at.is_none() {
            trade.confirmed_at = Some(now);
        }
        outcome = Outcome::Confirmed;
    }

    if event.event_type == EventType::FinalConfirmation && trade.status == TradeStatus::Confirmed {
        trade.status = TradeStatus::Completed;
        if trade.completed_at.is_none() {
            trade.completed_at = Some(now);
        }
        outcome = Outcome::Completed;
    }

    outcome
}

/// Move a trade into the absorbing `failed` state. Prior confirmation data
/// is kept. Returns false if the trade was already terminal.
pub fn mark_failed(trade: &mut Trade, reason: &str) -> bool {
    if trade.status.is_terminal() {
        return false;
    }
    trade.status = TradeStatus::Failed;
    trade.failure_reason = Some(reason.to_string());
    true
}
