use std::time::Duration;

use tracing::info;

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::jsonstat::JsonStatResponse;

// The catalogue is one mid-sized document; datasets can be large.
const CATALOGUE_TIMEOUT: Duration = Duration::from_secs(120);
const DATASET_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct EurostatClient {
    http: reqwest::Client,
    base_url: String,
    language: String,
}

impl EurostatClient {
    pub fn new(config: &ConnectorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            language: config.language.clone(),
        }
    }

    /// Fetches the provider's XML table of contents.
    pub async fn fetch_catalogue(&self) -> Result<String, ConnectorError> {
        let url = format!("{}/catalogue/toc/xml", self.base_url);
        info!("Fetching catalogue from {}", url);

        let response = self
            .http
            .get(&url)
            .timeout(CATALOGUE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }

    /// Fetches one dataset as JSON-stat in the configured language.
    pub async fn fetch_dataset(&self, code: &str) -> Result<JsonStatResponse, ConnectorError> {
        let url = format!("{}/statistics/1.0/data/{}", self.base_url, code);
        let language = self.language.to_uppercase();

        let response = self
            .http
            .get(&url)
            .query(&[("format", "JSON"), ("lang", language.as_str())])
            .timeout(DATASET_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}
