//! Fetching listing data from the third-party API.

use crate::config::{load_api_credentials, ApiConfig, PipelineConfig};
use crate::errors::PipelineError;
use crate::run::RunIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// The listings API seam.
///
/// One method, one GET: given a location query, return the decoded JSON
/// document. Production uses [`HttpListingsApi`]; tests script responses.
#[async_trait]
pub trait ListingsApi: Send + Sync + fmt::Debug {
    /// Searches listings for a location.
    async fn search(&self, location: &str) -> Result<serde_json::Value, PipelineError>;
}

/// The real HTTP client for the listings API.
pub struct HttpListingsApi {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl HttpListingsApi {
    /// Creates a client from the API config, loading the credential header
    /// map from the configured local file.
    pub fn new(config: &ApiConfig) -> Result<Self, PipelineError> {
        let headers = load_api_credentials(&config.credentials_path)?;
        Ok(Self::with_headers(config.url.clone(), headers))
    }

    /// Creates a client with an explicit header map.
    #[must_use]
    pub fn with_headers(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers,
        }
    }
}

impl fmt::Debug for HttpListingsApi {
    // Header values carry the API credential; log only the count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpListingsApi")
            .field("url", &self.url)
            .field("headers", &self.headers.len())
            .finish()
    }
}

#[async_trait]
impl ListingsApi for HttpListingsApi {
    async fn search(&self, location: &str) -> Result<serde_json::Value, PipelineError> {
        let mut request = self.client.get(&self.url).query(&[("location", location)]);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        debug!(url = %self.url, location, "requesting listings");
        let response = request.send().await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            PipelineError::malformed_response(format!("listings API body is not valid JSON: {e}"))
        })
    }
}

/// The two-element fetch result handed to the loader chain: where the raw
/// document was staged, and the object name its CSV will appear under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutput {
    /// The staging file holding the raw JSON document.
    pub staging_path: PathBuf,
    /// The derived CSV object name for this run.
    pub object_name: String,
}

/// Fetches one listings document and stages it as a local file.
#[derive(Debug)]
pub struct ListingFetcher {
    api: Arc<dyn ListingsApi>,
    location: String,
    staging_dir: PathBuf,
}

impl ListingFetcher {
    /// Creates a fetcher over an API client.
    #[must_use]
    pub fn new(api: Arc<dyn ListingsApi>, config: &PipelineConfig) -> Self {
        Self {
            api,
            location: config.api.location.clone(),
            staging_dir: config.staging_dir.clone(),
        }
    }

    /// Issues the GET, stages the document, and returns the fetch result.
    ///
    /// The staging file is named `response_data_<stamp>.json` and written
    /// pretty-printed. A body that is not valid JSON fails the whole fetch.
    pub async fn fetch(&self, run: &RunIdentity) -> Result<FetchOutput, PipelineError> {
        let document = self.api.search(&self.location).await?;

        let staging_path = self.staging_dir.join(run.raw_file_name());
        let pretty = serde_json::to_vec_pretty(&document).map_err(std::io::Error::from)?;
        tokio::fs::write(&staging_path, pretty).await?;
        info!(
            run_id = %run.run_id,
            path = %staging_path.display(),
            "staged raw listing document"
        );

        Ok(FetchOutput {
            staging_path,
            object_name: run.csv_object_name(),
        })
    }
}
