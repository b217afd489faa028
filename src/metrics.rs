use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::Network;

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder()?;

    // Pre-register per-network series so dashboards see them before the
    // first webhook arrives.
    for network in [Network::Eth, Network::Btc, Network::Sol, Network::Ltc] {
        counter!("events_received", "network" => network.as_str()).absolute(0);
        counter!("events_processed", "network" => network.as_str()).absolute(0);
        counter!("events_dead_lettered", "network" => network.as_str()).absolute(0);
        histogram!("event_processing_seconds", "network" => network.as_str()).record(0.0);
    }

    counter!("events_rejected_auth").absolute(0);
    counter!("events_unattributed").absolute(0);

    Ok(handle)
}
