pub mod dead_letter;
pub mod event;
pub mod trade;

pub use dead_letter::{DeadLetterEvent, DeadLetterStatus};
pub use event::{Event, EventType, Network, WebhookPayload};
pub use trade::{EventRecord, Trade, TradeStatus};
