use std::path::PathBuf;
use std::time::Duration;

use url::Url;
use uuid::Uuid;

use crate::error::ConnectorError;

pub const DEFAULT_BASE_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination";

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Local { data_dir: PathBuf },
    Gcs { bucket: String },
}

/// Run configuration, built from the environment exactly once at startup and
/// passed by reference from there on.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub connector_name: String,
    pub run_id: String,
    pub base_url: Url,
    pub language: String,
    pub storage: StorageBackend,
    pub state_dir: PathBuf,
    pub freshness_days: i64,
    pub worker_timeout: Duration,
    pub worker_binary: Option<PathBuf>,
}

impl ConnectorConfig {
    pub fn from_env() -> Result<Self, ConnectorError> {
        let connector_name = env_or("CONNECTOR_NAME", "eurostat");
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("local-{}", Uuid::new_v4().simple()));

        let base_url_raw = env_or("EUROSTAT_BASE_URL", DEFAULT_BASE_URL);
        let base_url = Url::parse(&base_url_raw).map_err(|e| ConnectorError::Config {
            message: format!("Invalid EUROSTAT_BASE_URL '{}': {}", base_url_raw, e),
        })?;

        let language = env_or("EUROSTAT_LANG", "en").to_lowercase();

        let storage = match env_or("STORAGE_BACKEND", "local").as_str() {
            "local" => StorageBackend::Local {
                data_dir: env_or("DATA_DIR", "data").into(),
            },
            "gcs" => StorageBackend::Gcs {
                bucket: std::env::var("GCS_BUCKET_NAME").map_err(|_| ConnectorError::Config {
                    message: "GCS_BUCKET_NAME is required when STORAGE_BACKEND=gcs".to_string(),
                })?,
            },
            other => {
                return Err(ConnectorError::Config {
                    message: format!("Unsupported storage backend: {}", other),
                });
            }
        };

        let state_dir = env_or("STATE_DIR", "state").into();
        let freshness_days = parse_env("FRESHNESS_DAYS", 30)?;
        let worker_timeout = Duration::from_secs(parse_env("DATASET_TIMEOUT_SECS", 1200)?);
        let worker_binary = std::env::var("PROCESS_DATASET_BIN").ok().map(PathBuf::from);

        Ok(Self {
            connector_name,
            run_id,
            base_url,
            language,
            storage,
            state_dir,
            freshness_days,
            worker_timeout,
            worker_binary,
        })
    }

    /// Name of the published catalogue table, e.g. `eurostat_catalogue`.
    pub fn catalogue_table_name(&self) -> String {
        format!("{}_catalogue", self.connector_name)
    }

    /// Name of a published dataset table, e.g. `eurostat_ei_bpm6ca_q`.
    pub fn dataset_table_name(&self, code: &str) -> String {
        format!("{}_{}", self.connector_name, code)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConnectorError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConnectorError::Config {
            message: format!("Invalid {} '{}': {}", key, raw, e),
        }),
        Err(_) => Ok(default),
    }
}
