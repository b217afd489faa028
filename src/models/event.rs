use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Blockchain networks the monitoring provider delivers webhooks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Eth,
    Btc,
    Sol,
    Ltc,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Eth => "eth",
            Network::Btc => "btc",
            Network::Sol => "sol",
            Network::Ltc => "ltc",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eth" => Ok(Network::Eth),
            "btc" => Ok(Network::Btc),
            "sol" => Ok(Network::Sol),
            "ltc" => Ok(Network::Ltc),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Kind of confirmation notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Confirmation,
    FinalConfirmation,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Confirmation => f.write_str("confirmation"),
            EventType::FinalConfirmation => f.write_str("final_confirmation"),
        }
    }
}

/// One normalized confirmation notification, as handed from the webhook
/// receiver to the processor. `event_id` is assigned by the receiver and is
/// never taken from the provider payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub trade_id: String,
    pub network: Network,
    pub tx_hash: String,
    pub confirmation_count: u32,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    /// Auxiliary provider fields (amounts, inputs/outputs). Must never hold
    /// private key material.
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Attempts made so far; 0 at creation, bumped by the processor.
    pub retry_count: u32,
}

/// Raw provider payload for `POST /webhooks/{network}`.
///
/// Only `hash`, `confirmations` and `addresses` are validated; everything
/// else is folded into the event's opaque data bag as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub hash: String,
    pub addresses: Vec<String>,
    pub confirmations: u32,
    #[serde(default)]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub received: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub inputs: Option<serde_json::Value>,
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
}

impl WebhookPayload {
    /// True when the payload carries the explicit final-confirmation marker.
    pub fn is_final(&self) -> bool {
        self.event_type.as_deref() == Some("final_confirmation")
    }
}
