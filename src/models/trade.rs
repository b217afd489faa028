use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{Event, EventType, Network};

/// Lifecycle state of an escrow trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Confirmed,
    Completed,
    Failed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Confirmed => "confirmed",
            TradeStatus::Completed => "completed",
            TradeStatus::Failed => "failed",
        }
    }

    /// `completed` and `failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Completed | TradeStatus::Failed)
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TradeStatus::Pending),
            "confirmed" => Ok(TradeStatus::Confirmed),
            "completed" => Ok(TradeStatus::Completed),
            "failed" => Ok(TradeStatus::Failed),
            other => Err(format!("unknown trade status: {other}")),
        }
    }
}

/// Audit summary of one applied event, appended to the trade history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub network: Network,
    pub tx_hash: String,
    pub confirmation_count: u32,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.event_id.clone(),
            network: event.network,
            tx_hash: event.tx_hash.clone(),
            confirmation_count: event.confirmation_count,
            event_type: event.event_type,
            timestamp: event.timestamp,
        }
    }
}

/// Durable per-trade aggregate: confirmation progress plus an append-only
/// history of every event applied (or recorded late, for terminal trades).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub status: TradeStatus,
    /// Highest confirmation count observed; never decreases.
    pub confirmations: u32,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub events: Vec<EventRecord>,
}

impl Trade {
    /// Fresh trade in `pending` state, created on first sighting of a
    /// `trade_id`.
    pub fn new(trade_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            trade_id: trade_id.into(),
            status: TradeStatus::Pending,
            confirmations: 0,
            created_at,
            confirmed_at: None,
            completed_at: None,
            failure_reason: None,
            events: Vec::new(),
        }
    }

    pub fn has_event(&self, event_id: &str) -> bool {
        self.events.iter().any(|e| e.event_id == event_id)
    }
}
