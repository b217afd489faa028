use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{DeadLetterEvent, DeadLetterStatus, Network, Trade};

use super::{AddressBook, DeadLetterStore, StoreError, TradeStore};

/// In-memory store backing all three persistence traits. Reference
/// implementation of the contract and the backing used by tests; not
/// crash-durable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    trades: RwLock<HashMap<String, Trade>>,
    dead_letters: RwLock<HashMap<String, DeadLetterEvent>>,
    addresses: RwLock<HashMap<(Network, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address → trade mapping, as the wallet subsystem would.
    pub async fn map_address(&self, network: Network, address: &str, trade_id: &str) {
        self.addresses
            .write()
            .await
            .insert((network, address.to_string()), trade_id.to_string());
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        Ok(self.trades.read().await.get(trade_id).cloned())
    }

    async fn put_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.trades
            .write()
            .await
            .insert(trade.trade_id.clone(), trade.clone());
        Ok(())
    }
}

#[async_trait]
impl DeadLetterStore for MemoryStore {
    async fn add(&self, entry: &DeadLetterEvent) -> Result<(), StoreError> {
        self.dead_letters
            .write()
            .await
            .insert(entry.event_id.clone(), entry.clone());
        Ok(())
    }

    async fn get(&self, event_id: &str) -> Result<Option<DeadLetterEvent>, StoreError> {
        Ok(self.dead_letters.read().await.get(event_id).cloned())
    }

    async fn list_unresolved(
        &self,
        network: Option<Network>,
        limit: usize,
    ) -> Result<Vec<DeadLetterEvent>, StoreError> {
        let mut entries: Vec<DeadLetterEvent> = self
            .dead_letters
            .read()
            .await
            .values()
            .filter(|e| e.status != DeadLetterStatus::Resolved)
            .filter(|e| network.map_or(true, |n| e.original_event.network == n))
            .cloned()
            .collect();

        entries.sort_by(|a, b| b.failed_at.cmp(&a.failed_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn mark(
        &self,
        event_id: &str,
        status: DeadLetterStatus,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut dead_letters = self.dead_letters.write().await;
        match dead_letters.get_mut(event_id) {
            Some(entry) => {
                entry.status = status;
                if let Some(notes) = notes {
                    entry.notes = Some(notes.to_string());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AddressBook for MemoryStore {
    async fn resolve_trade_id(
        &self,
        address: &str,
        network: Network,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .addresses
            .read()
            .await
            .get(&(network, address.to_string()))
            .cloned())
    }
}
