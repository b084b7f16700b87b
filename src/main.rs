//! Consumer entrypoint: connect, resolve the document topic, load the model, open
//! the output file, then run the consume loop until the feed closes or Ctrl-C.

use anyhow::Context;
use baleen_entity_consumer::{
    broker::{Broker, HttpBroker},
    config::ConsumerConfig,
    telemetry, CsvSink, EnrichmentModel, Pipeline, TopicResolver, BALEEN_TOPIC,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = ConsumerConfig::from_env().context("reading configuration")?;
    if let Some(addr) = cfg.metrics_addr {
        telemetry::install_prometheus(addr).context("starting metrics endpoint")?;
    } else {
        telemetry::describe_metrics();
    }

    let broker = HttpBroker::connect(&cfg.credentials)
        .await
        .context("could not create client")?;
    info!(broker = broker.name(), at = %chrono::Utc::now(), "connection established");

    let topic = TopicResolver::new(&broker)
        .resolve(BALEEN_TOPIC)
        .await
        .context("resolving topic")?;

    let sub = broker
        .subscribe(&topic)
        .await
        .context("could not create subscriber")?;

    let model = EnrichmentModel::load(cfg.lexicon_path.as_deref(), cfg.entity_rules_path.as_deref())
        .context("failed to load enrichment model")?;

    let sink = CsvSink::create(&cfg.output_path).context("failed creating output file")?;
    info!(path = %cfg.output_path.display(), "writing entities");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let (stats, _sink) = Pipeline::new(&model, sink).run(sub, shutdown).await;
    info!(?stats, "done");
    Ok(())
}
