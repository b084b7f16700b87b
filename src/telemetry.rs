// src/telemetry.rs
use std::net::SocketAddr;

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

/// Start the Prometheus scrape endpoint. Must run inside the tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    tracing::info!(%addr, "metrics endpoint listening");
    Ok(())
}

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("consumer_events_total", "Events received from the subscription.");
        describe_counter!("consumer_documents_total", "Document events enriched.");
        describe_counter!("consumer_feed_items_total", "FeedItem events seen and skipped.");
        describe_counter!(
            "consumer_ignored_events_total",
            "Events of unrecognized type."
        );
        describe_counter!(
            "consumer_decode_errors_total",
            "Document payloads that failed to decode."
        );
        describe_counter!(
            "consumer_extraction_errors_total",
            "Documents the enrichment model rejected."
        );
        describe_counter!("consumer_rows_written_total", "Entity rows appended.");
        describe_counter!("consumer_row_errors_total", "Entity rows that failed to write.");
        describe_histogram!(
            "consumer_process_ms",
            "Decode + enrich + write time per document in milliseconds."
        );
    });
}
