use chrono::Utc;
use tracing::{info, warn};

use crate::catalogue::{self, CatalogueEntry};
use crate::client::EurostatClient;
use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::state::{FreshnessRecord, StateStore, CATALOGUE_STATE_KEY};
use crate::sink::TableSink;
use crate::worker::DatasetRunner;

/// Final accounting for one run. The three sets are disjoint and together
/// cover every dataset in the catalogue.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

pub struct Orchestrator {
    client: EurostatClient,
    sink: Box<dyn TableSink>,
    state: Box<dyn StateStore>,
    runner: Box<dyn DatasetRunner>,
    catalogue_table: String,
    language: String,
    freshness_days: i64,
}

impl Orchestrator {
    pub fn new(
        config: &ConnectorConfig,
        client: EurostatClient,
        sink: Box<dyn TableSink>,
        state: Box<dyn StateStore>,
        runner: Box<dyn DatasetRunner>,
    ) -> Self {
        Self {
            client,
            sink,
            state,
            runner,
            catalogue_table: config.catalogue_table_name(),
            language: config.language.clone(),
            freshness_days: config.freshness_days,
        }
    }

    /// One full run: catalogue first, then every eligible dataset, one at a
    /// time. Catalogue failures are fatal; dataset failures are recorded and
    /// never stop the remaining datasets.
    pub async fn run(&self) -> Result<RunSummary, ConnectorError> {
        let xml = self.client.fetch_catalogue().await?;
        let entries = catalogue::extract_catalogue(&xml, &self.language)?;
        info!("Loaded {} datasets from catalogue", entries.len());

        self.publish_catalogue(&entries).await?;

        Ok(self.sync_datasets(&entries).await)
    }

    /// Publishes the catalogue table and its freshness record. Nothing
    /// downstream is meaningful without the dataset list, so any failure
    /// here propagates.
    pub async fn publish_catalogue(
        &self,
        entries: &[CatalogueEntry],
    ) -> Result<(), ConnectorError> {
        self.sink
            .publish(&self.catalogue_table, &catalogue::to_table(entries))
            .await?;
        self.state
            .save(
                CATALOGUE_STATE_KEY,
                &FreshnessRecord {
                    last_updated: Utc::now(),
                    row_count: entries.len() as u64,
                },
            )
            .await?;
        Ok(())
    }

    /// Partitions the catalogue by freshness, then drives one isolated
    /// execution per eligible dataset.
    pub async fn sync_datasets(&self, entries: &[CatalogueEntry]) -> RunSummary {
        let mut to_process = Vec::new();
        let mut skipped = Vec::new();

        for entry in entries {
            if self.is_fresh(&entry.code).await {
                skipped.push(entry.code.clone());
            } else {
                to_process.push(entry.code.clone());
            }
        }

        info!(
            "Dataset status: {} up to date, {} to process",
            skipped.len(),
            to_process.len()
        );

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let total = to_process.len();

        for (i, code) in to_process.into_iter().enumerate() {
            info!("[{}/{}] Processing {}...", i + 1, total, code);
            let outcome = self.runner.run(&code).await;
            if outcome.success {
                info!(
                    "Processed {} in {:.1}s",
                    code,
                    outcome.elapsed.as_secs_f64()
                );
                succeeded.push(code);
            } else {
                // No freshness record was written, so the dataset stays
                // eligible and is retried on the next run.
                warn!(
                    "Failed to process {}: {}",
                    code,
                    outcome.detail.as_deref().unwrap_or("unknown error")
                );
                failed.push(code);
            }
        }

        RunSummary {
            succeeded,
            failed,
            skipped,
        }
    }

    /// A dataset is fresh when its record is younger than the freshness
    /// window. Whole days are compared, so a record exactly at the window is
    /// already stale.
    async fn is_fresh(&self, code: &str) -> bool {
        let record = match self.state.load(code).await {
            Ok(record) => record,
            Err(err) => {
                warn!("Failed to load sync state for {}: {}", code, err);
                None
            }
        };

        match record {
            Some(record) => {
                let age_days = Utc::now()
                    .signed_duration_since(record.last_updated)
                    .num_days();
                age_days < self.freshness_days
            }
            None => false,
        }
    }
}
