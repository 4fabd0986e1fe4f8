//! Processes a single dataset by code. Invoked by the orchestrator as a
//! subprocess so one dataset's memory use or hang cannot affect the run.

use anyhow::Context;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eurostat_connector::client::EurostatClient;
use eurostat_connector::sink::{ObjectStoreSink, TableSink};
use eurostat_connector::state::{FileStateStore, FreshnessRecord, StateStore};
use eurostat_connector::ConnectorConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eurostat_connector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let code = std::env::args()
        .nth(1)
        .context("usage: process-dataset <dataset-code>")?;

    let config = ConnectorConfig::from_env()?;
    let client = EurostatClient::new(&config);

    info!("Processing {}...", code);
    let dataset = client.fetch_dataset(&code).await?.validate()?;
    let table = dataset.to_table();

    // The provider legitimately has empty datasets: nothing to publish, no
    // freshness record, still a successful exit.
    if table.is_empty() {
        info!("No data found for {}", code);
        return Ok(());
    }

    info!("Uploading {} rows...", table.num_rows());
    let sink = ObjectStoreSink::from_config(&config)?;
    sink.publish(&config.dataset_table_name(&code), &table)
        .await?;

    let state = FileStateStore::new(&config.state_dir);
    state
        .save(
            &code,
            &FreshnessRecord {
                last_updated: Utc::now(),
                row_count: table.num_rows() as u64,
            },
        )
        .await?;

    info!(
        "Successfully processed {}: {} rows",
        code,
        table.num_rows()
    );
    Ok(())
}
