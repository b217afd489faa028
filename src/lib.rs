pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod queue;
pub mod store;
pub mod webhook;

use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::queue::EventQueue;
use crate::store::{AddressBook, DeadLetterStore, TradeStore};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub queue: EventQueue,
    pub trades: Arc<dyn TradeStore>,
    pub dlq: Arc<dyn DeadLetterStore>,
    pub address_book: Arc<dyn AddressBook>,
    /// Runtime-adjustable confirmation threshold, shared with the processor.
    pub threshold: Arc<AtomicU32>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
