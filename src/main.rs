use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::sync::watch;

use confirmd::api::router::create_router;
use confirmd::config::AppConfig;
use confirmd::metrics::init_metrics;
use confirmd::processor::{EventProcessor, RetryPolicy};
use confirmd::queue::EventQueue;
use confirmd::store::{pg, PgStore};
use confirmd::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Missing secret or unreachable store abort startup: the receiver must
    // not run with unverifiable authentication or nowhere to write.
    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let metrics_handle = init_metrics()?;

    tracing::info!("Connecting to database...");
    let pool = pg::init_pool(&config.database_url).await?;
    tracing::info!("Database connected, migrations applied");

    let store = Arc::new(PgStore::new(pool));
    let threshold = Arc::new(AtomicU32::new(config.confirmation_threshold));

    let (queue, queue_rx) = EventQueue::bounded(config.event_queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = EventProcessor::new(
        store.clone(),
        store.clone(),
        threshold.clone(),
        RetryPolicy {
            max_attempts: config.max_retry_attempts,
            initial_delay: config.retry_initial_delay,
            max_delay: config.retry_max_delay,
        },
    );

    let worker = tokio::spawn(async move {
        processor.run(queue_rx, shutdown_rx).await;
    });
    tracing::info!(
        threshold = config.confirmation_threshold,
        queue_capacity = config.event_queue_capacity,
        "Event processor spawned"
    );

    let state = AppState {
        config,
        queue,
        trades: store.clone(),
        dlq: store.clone(),
        address_book: store,
        threshold,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-flight event finish its retry/commit cycle before exit.
    tracing::info!("Shutting down, draining event processor");
    let _ = shutdown_tx.send(true);
    worker.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
