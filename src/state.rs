use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConnectorError;

/// Reserved state key for the catalogue itself; its `row_count` holds the
/// dataset count.
pub const CATALOGUE_STATE_KEY: &str = "catalogue";

/// Per-dataset synchronization state. Freshness is all-or-nothing per
/// dataset; there is no row-level state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessRecord {
    pub last_updated: DateTime<Utc>,
    pub row_count: u64,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<FreshnessRecord>, ConnectorError>;
    async fn save(&self, key: &str, record: &FreshnessRecord) -> Result<(), ConnectorError>;
}

/// Key-value store holding one JSON document per key.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<FreshnessRecord>, ConnectorError> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // A corrupt record must not wedge the dataset forever; treat
                // it as missing so the dataset becomes eligible again.
                warn!("Discarding unreadable state for {}: {}", key, err);
                Ok(None)
            }
        }
    }

    async fn save(&self, key: &str, record: &FreshnessRecord) -> Result<(), ConnectorError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.path_for(key), bytes).await?;
        Ok(())
    }
}
