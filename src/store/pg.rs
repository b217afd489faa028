use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::{DeadLetterEvent, DeadLetterStatus, Event, EventRecord, Network, Trade};

use super::{AddressBook, DeadLetterStore, StoreError, TradeStore};

/// Connect, verify connectivity, and apply migrations.
pub async fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// PostgreSQL-backed trade store, DLQ and address book. Trades and dead
/// letters are single-row-per-key documents with JSONB payloads; upserts via
/// `ON CONFLICT` keep per-key writes atomic.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TradeRow {
    trade_id: String,
    status: String,
    confirmations: i64,
    created_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    events: serde_json::Value,
}

impl TradeRow {
    fn into_trade(self) -> Result<Trade, StoreError> {
        let status = self.status.parse().map_err(|reason| StoreError::Corrupt {
            key: self.trade_id.clone(),
            reason,
        })?;
        let events: Vec<EventRecord> =
            serde_json::from_value(self.events).map_err(|e| StoreError::Corrupt {
                key: self.trade_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Trade {
            trade_id: self.trade_id,
            status,
            confirmations: self.confirmations.max(0) as u32,
            created_at: self.created_at,
            confirmed_at: self.confirmed_at,
            completed_at: self.completed_at,
            failure_reason: self.failure_reason,
            events,
        })
    }
}

#[async_trait]
impl TradeStore for PgStore {
    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        let row = sqlx::query_as::<_, TradeRow>(
            "SELECT trade_id, status, confirmations, created_at, confirmed_at, completed_at, \
             failure_reason, events FROM trades WHERE trade_id = $1",
        )
        .bind(trade_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TradeRow::into_trade).transpose()
    }

    async fn put_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        let events = serde_json::to_value(&trade.events).map_err(|e| StoreError::Corrupt {
            key: trade.trade_id.clone(),
            reason: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO trades (trade_id, status, confirmations, created_at, confirmed_at,
                                completed_at, failure_reason, events)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (trade_id) DO UPDATE SET
                status = EXCLUDED.status,
                confirmations = EXCLUDED.confirmations,
                confirmed_at = EXCLUDED.confirmed_at,
                completed_at = EXCLUDED.completed_at,
                failure_reason = EXCLUDED.failure_reason,
                events = EXCLUDED.events
            "#,
        )
        .bind(&trade.trade_id)
        .bind(trade.status.as_str())
        .bind(trade.confirmations as i64)
        .bind(trade.created_at)
        .bind(trade.confirmed_at)
        .bind(trade.completed_at)
        .bind(&trade.failure_reason)
        .bind(events)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
    event_id: String,
    trade_id: String,
    error_message: String,
    retry_count: i64,
    status: String,
    notes: Option<String>,
    failed_at: DateTime<Utc>,
    original_event: serde_json::Value,
}

impl DeadLetterRow {
    fn into_entry(self) -> Result<DeadLetterEvent, StoreError> {
        let status = self.status.parse().map_err(|reason| StoreError::Corrupt {
            key: self.event_id.clone(),
            reason,
        })?;
        let original_event: Event =
            serde_json::from_value(self.original_event).map_err(|e| StoreError::Corrupt {
                key: self.event_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(DeadLetterEvent {
            event_id: self.event_id,
            trade_id: self.trade_id,
            error_message: self.error_message,
            retry_count: self.retry_count.max(0) as u32,
            status,
            notes: self.notes,
            failed_at: self.failed_at,
            original_event,
        })
    }
}

#[async_trait]
impl DeadLetterStore for PgStore {
    async fn add(&self, entry: &DeadLetterEvent) -> Result<(), StoreError> {
        let original_event =
            serde_json::to_value(&entry.original_event).map_err(|e| StoreError::Corrupt {
                key: entry.event_id.clone(),
                reason: e.to_string(),
            })?;

        sqlx::query(
            r#"
            INSERT INTO dead_letters (event_id, trade_id, network, error_message, retry_count,
                                      status, notes, failed_at, original_event)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_id) DO UPDATE SET
                error_message = EXCLUDED.error_message,
                retry_count = EXCLUDED.retry_count,
                status = EXCLUDED.status,
                failed_at = EXCLUDED.failed_at,
                original_event = EXCLUDED.original_event
            "#,
        )
        .bind(&entry.event_id)
        .bind(&entry.trade_id)
        .bind(entry.original_event.network.as_str())
        .bind(&entry.error_message)
        .bind(entry.retry_count as i64)
        .bind(entry.status.as_str())
        .bind(&entry.notes)
        .bind(entry.failed_at)
        .bind(original_event)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, event_id: &str) -> Result<Option<DeadLetterEvent>, StoreError> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            "SELECT event_id, trade_id, error_message, retry_count, status, notes, failed_at, \
             original_event FROM dead_letters WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeadLetterRow::into_entry).transpose()
    }

    async fn list_unresolved(
        &self,
        network: Option<Network>,
        limit: usize,
    ) -> Result<Vec<DeadLetterEvent>, StoreError> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT event_id, trade_id, error_message, retry_count, status, notes, failed_at,
                   original_event
            FROM dead_letters
            WHERE status <> 'resolved' AND ($1::text IS NULL OR network = $1)
            ORDER BY failed_at DESC
            LIMIT $2
            "#,
        )
        .bind(network.map(|n| n.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeadLetterRow::into_entry).collect()
    }

    async fn mark(
        &self,
        event_id: &str,
        status: DeadLetterStatus,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE dead_letters SET status = $2, notes = COALESCE($3, notes) WHERE event_id = $1",
        )
        .bind(event_id)
        .bind(status.as_str())
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AddressBook for PgStore {
    async fn resolve_trade_id(
        &self,
        address: &str,
        network: Network,
    ) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT trade_id FROM trade_wallets WHERE network = $1 AND address = $2",
        )
        .bind(network.as_str())
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(trade_id,)| trade_id))
    }
}
