use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::mpsc;

use confirmd::config::AppConfig;
use confirmd::models::{Event, EventType, Network, Trade};
use confirmd::queue::EventQueue;
use confirmd::store::{MemoryStore, StoreError, TradeStore};
use confirmd::AppState;

pub const TEST_SECRET: &str = "test-webhook-secret";

/// The Prometheus recorder is process-global; install it once per test binary.
#[allow(dead_code)]
pub fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| confirmd::metrics::init_metrics().expect("metrics recorder"))
        .clone()
}

#[allow(dead_code)]
pub fn test_config(api_token: Option<String>) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused-in-tests".into(),
        host: "127.0.0.1".into(),
        port: 0,
        webhook_secret: TEST_SECRET.into(),
        api_token,
        confirmation_threshold: 3,
        event_queue_capacity: 16,
        max_retry_attempts: 5,
        retry_initial_delay: Duration::from_secs(2),
        retry_max_delay: Duration::from_secs(10),
    }
}

/// Router wired to in-memory stores. The queue consumer end is returned so
/// tests can assert exactly what got enqueued.
#[allow(dead_code)]
pub fn build_test_app(
    store: Arc<MemoryStore>,
    queue_capacity: usize,
    api_token: Option<String>,
) -> (Router, mpsc::Receiver<Event>, AppState) {
    let (queue, queue_rx) = EventQueue::bounded(queue_capacity);

    let state = AppState {
        config: test_config(api_token),
        queue,
        trades: store.clone(),
        dlq: store.clone(),
        address_book: store,
        threshold: Arc::new(AtomicU32::new(3)),
        metrics_handle: metrics_handle(),
    };

    let router = confirmd::api::router::create_router(state.clone());
    (router, queue_rx, state)
}

#[allow(dead_code)]
pub fn make_event(event_id: &str, trade_id: &str, confirmations: u32, event_type: EventType) -> Event {
    Event {
        event_id: event_id.into(),
        trade_id: trade_id.into(),
        network: Network::Eth,
        tx_hash: format!("0xhash-{event_id}"),
        confirmation_count: confirmations,
        event_type,
        timestamp: Utc::now(),
        data: serde_json::Map::new(),
        retry_count: 0,
    }
}

/// Poll the store until the trade satisfies `pred` or the timeout elapses.
#[allow(dead_code)]
pub async fn wait_for_trade<F>(
    store: &MemoryStore,
    trade_id: &str,
    timeout: Duration,
    pred: F,
) -> Option<Trade>
where
    F: Fn(&Trade) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(trade)) = store.get_trade(trade_id).await {
            if pred(&trade) {
                return Some(trade);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Trade store with a switchable injected outage, for retry/DLQ tests.
pub struct FlakyTradeStore {
    inner: Arc<MemoryStore>,
    pub failing: AtomicBool,
}

#[allow(dead_code)]
impl FlakyTradeStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TradeStore for FlakyTradeStore {
    async fn get_trade(&self, trade_id: &str) -> Result<Option<Trade>, StoreError> {
        self.check()?;
        self.inner.get_trade(trade_id).await
    }

    async fn put_trade(&self, trade: &Trade) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put_trade(trade).await
    }
}
