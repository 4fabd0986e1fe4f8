use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eurostat_connector::client::EurostatClient;
use eurostat_connector::orchestrator::Orchestrator;
use eurostat_connector::sink::ObjectStoreSink;
use eurostat_connector::state::FileStateStore;
use eurostat_connector::worker::SubprocessRunner;
use eurostat_connector::ConnectorConfig;

const FAILURE_PREVIEW_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eurostat_connector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConnectorConfig::from_env()?;
    info!(
        "Starting {} connector (run {})",
        config.connector_name, config.run_id
    );

    let client = EurostatClient::new(&config);
    let sink = ObjectStoreSink::from_config(&config)?;
    let state = FileStateStore::new(&config.state_dir);
    let runner = SubprocessRunner::from_config(&config)?;

    let orchestrator = Orchestrator::new(
        &config,
        client,
        Box::new(sink),
        Box::new(state),
        Box::new(runner),
    );

    let summary = orchestrator.run().await?;

    info!("Connector run complete");
    info!("  Succeeded: {}", summary.succeeded.len());
    if !summary.failed.is_empty() {
        warn!("  Failed: {}", summary.failed.len());
        for code in summary.failed.iter().take(FAILURE_PREVIEW_LIMIT) {
            warn!("    - {}", code);
        }
        if summary.failed.len() > FAILURE_PREVIEW_LIMIT {
            warn!(
                "    ... and {} more",
                summary.failed.len() - FAILURE_PREVIEW_LIMIT
            );
        }
    }
    info!("  Skipped (up to date): {}", summary.skipped.len());

    Ok(())
}
