pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::models::{DeadLetterEvent, DeadLetterStatus, Network, Trade};

pub use memory::MemoryStore;
pub use pg::PgStore;

/// Persistence failure. The processor treats every variant as retryable;
/// permanence is only established by exhausting the retry budget.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record for key {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable record of each trade's confirmation state.
///
/// The processor is the only writer; implementations must give per-key
/// atomic read-modify-write (the single-consumer loop serializes updates,
/// upsert semantics protect against a concurrent admin reader).
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError>;

    /// Insert or replace the full trade record.
    async fn put_trade(&self, trade: &Trade) -> Result<(), StoreError>;
}

/// Durable holding area for events that exhausted their retry budget.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Insert or update-in-place keyed by `event_id`.
    async fn add(&self, entry: &DeadLetterEvent) -> Result<(), StoreError>;

    async fn get(&self, event_id: &str) -> Result<Option<DeadLetterEvent>, StoreError>;

    /// Unresolved entries (includes `superseded`), newest first, optionally
    /// filtered by network.
    async fn list_unresolved(
        &self,
        network: Option<Network>,
        limit: usize,
    ) -> Result<Vec<DeadLetterEvent>, StoreError>;

    /// Update resolution status without deleting; the audit trail is
    /// preserved. Returns false if no entry exists for `event_id`.
    async fn mark(
        &self,
        event_id: &str,
        status: DeadLetterStatus,
        notes: Option<&str>,
    ) -> Result<bool, StoreError>;
}

/// Wallet-subsystem collaborator: maps deposit addresses back to trades.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Resolve which trade an incoming address belongs to. `None` is a
    /// non-error: the event cannot be attributed and is dropped with a log.
    async fn resolve_trade_id(
        &self,
        address: &str,
        network: Network,
    ) -> Result<Option<String>, StoreError>;
}
