use std::sync::Arc;

use async_trait::async_trait;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::info;

use crate::config::{ConnectorConfig, StorageBackend};
use crate::error::ConnectorError;
use crate::table::DataTable;

#[async_trait]
pub trait TableSink: Send + Sync {
    async fn publish(&self, name: &str, table: &DataTable) -> Result<(), ConnectorError>;
}

/// Publishes tables as CSV objects named `{table}.csv`, backed by the local
/// filesystem or a GCS bucket depending on configuration.
pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreSink {
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let store: Arc<dyn ObjectStore> = match &config.storage {
            StorageBackend::Local { data_dir } => {
                std::fs::create_dir_all(data_dir)?;
                Arc::new(LocalFileSystem::new_with_prefix(data_dir)?)
            }
            StorageBackend::Gcs { bucket } => create_gcs_store(bucket)?,
        };
        Ok(Self { store })
    }
}

#[async_trait]
impl TableSink for ObjectStoreSink {
    async fn publish(&self, name: &str, table: &DataTable) -> Result<(), ConnectorError> {
        let body = encode_csv(table)?;
        let path = ObjectPath::from(format!("{}.csv", name));
        self.store.put(&path, body.into()).await?;
        info!("Published table {} ({} rows)", name, table.num_rows());
        Ok(())
    }
}

fn create_gcs_store(bucket: &str) -> Result<Arc<dyn ObjectStore>, ConnectorError> {
    let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);

    if let Ok(service_account_path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        builder = builder.with_service_account_path(service_account_path);
    }

    let store = builder.build().map_err(|e| ConnectorError::Config {
        message: format!("Failed to create GCS client for bucket '{}': {}", bucket, e),
    })?;

    Ok(Arc::new(store))
}

/// Null cells become empty CSV fields; the header row carries column names.
fn encode_csv(table: &DataTable) -> Result<Vec<u8>, ConnectorError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.into_inner().map_err(|e| ConnectorError::Io {
        message: e.to_string(),
    })
}
