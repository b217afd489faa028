use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::Event;

/// Resolution state of a dead-letter entry.
///
/// `Superseded` means the entry has been replayed back onto the queue but the
/// replay has not committed yet; the processor promotes it to `Resolved` when
/// the replayed event finally succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadLetterStatus {
    Unresolved,
    Superseded,
    Resolved,
}

impl DeadLetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadLetterStatus::Unresolved => "unresolved",
            DeadLetterStatus::Superseded => "superseded",
            DeadLetterStatus::Resolved => "resolved",
        }
    }
}

impl std::str::FromStr for DeadLetterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unresolved" => Ok(DeadLetterStatus::Unresolved),
            "superseded" => Ok(DeadLetterStatus::Superseded),
            "resolved" => Ok(DeadLetterStatus::Resolved),
            other => Err(format!("unknown dead letter status: {other}")),
        }
    }
}

/// An event whose processing exhausted the retry budget, parked for operator
/// inspection. Keyed by `event_id`; re-adding the same id updates in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEvent {
    pub event_id: String,
    pub trade_id: String,
    pub error_message: String,
    pub retry_count: u32,
    pub status: DeadLetterStatus,
    pub notes: Option<String>,
    pub failed_at: DateTime<Utc>,
    pub original_event: Event,
}

impl DeadLetterEvent {
    pub fn new(event: Event, error_message: String, retry_count: u32, failed_at: DateTime<Utc>) -> Self {
        Self {
            event_id: event.event_id.clone(),
            trade_id: event.trade_id.clone(),
            error_message,
            retry_count,
            status: DeadLetterStatus::Unresolved,
            notes: None,
            failed_at,
            original_event: event,
        }
    }
}
