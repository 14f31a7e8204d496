//! Configuration for the pipeline stages.
//!
//! Every stage takes an explicit configuration object at construction, so a
//! deployment can substitute per-environment values and tests can point the
//! stages at fakes. API credentials are never embedded here: they are loaded
//! from a local JSON file holding a flat header map.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the listings API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// The search endpoint URL.
    #[serde(default = "default_api_url")]
    pub url: String,
    /// The fixed `location` query value.
    #[serde(default = "default_location")]
    pub location: String,
    /// Path to the local JSON file holding the request header map,
    /// including the API credential.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_api_url() -> String {
    "https://zillow56.p.rapidapi.com/search".to_string()
}

fn default_location() -> String {
    "houston, tx".to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("config_api.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            location: default_location(),
            credentials_path: default_credentials_path(),
        }
    }
}

impl ApiConfig {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the query location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// The object-store bucket names each stage reads from or writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Receives freshly uploaded raw JSON and triggers downstream processing.
    #[serde(default = "default_incoming_bucket")]
    pub incoming: String,
    /// Destination for the unmodified raw-copy of every incoming object.
    #[serde(default = "default_archival_bucket")]
    pub archival: String,
    /// Destination for transformed CSV artifacts, polled by the loader chain.
    #[serde(default = "default_cleaned_bucket")]
    pub cleaned: String,
    /// Where the loader chain drops the fetched staging file.
    ///
    /// Defaults to the incoming bucket, so the object-created notification
    /// fires the event handlers and the CSV the chain's sensor polls for is
    /// causally produced by the same run.
    #[serde(default = "default_incoming_bucket")]
    pub landing: String,
}

fn default_incoming_bucket() -> String {
    "raw-json-incoming".to_string()
}

fn default_archival_bucket() -> String {
    "raw-json-archive".to_string()
}

fn default_cleaned_bucket() -> String {
    "cleaned-data-csv".to_string()
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            incoming: default_incoming_bucket(),
            archival: default_archival_bucket(),
            cleaned: default_cleaned_bucket(),
            landing: default_incoming_bucket(),
        }
    }
}

impl BucketConfig {
    /// All configured bucket names, duplicates included.
    #[must_use]
    pub fn names(&self) -> [&str; 4] {
        [&self.incoming, &self.archival, &self.cleaned, &self.landing]
    }

    /// Sets the landing bucket.
    #[must_use]
    pub fn with_landing(mut self, bucket: impl Into<String>) -> Self {
        self.landing = bucket.into();
        self
    }
}

/// Warehouse coordinates for the bulk load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Postgres-protocol connection URL for the warehouse cluster.
    #[serde(default = "default_warehouse_url")]
    pub connection_url: String,
    /// Target schema.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Target table.
    #[serde(default = "default_table")]
    pub table: String,
    /// IAM role ARN granted to the cluster for reading the object store,
    /// rendered into the COPY statement when set.
    #[serde(default)]
    pub iam_role: Option<String>,
}

fn default_warehouse_url() -> String {
    "postgres://localhost:5439/dev".to_string()
}

fn default_schema() -> String {
    "PUBLIC".to_string()
}

fn default_table() -> String {
    "listingdata".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            connection_url: default_warehouse_url(),
            schema: default_schema(),
            table: default_table(),
            iam_role: None,
        }
    }
}

/// Bounds for a poll-until-present wait on an object key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Seconds between existence checks.
    #[serde(default = "default_wait_interval")]
    pub interval_seconds: f64,
    /// Seconds before the wait gives up.
    #[serde(default = "default_wait_timeout")]
    pub timeout_seconds: f64,
}

fn default_wait_interval() -> f64 {
    5.0
}

fn default_wait_timeout() -> f64 {
    100.0
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_wait_interval(),
            timeout_seconds: default_wait_timeout(),
        }
    }
}

impl WaitConfig {
    /// The bounds used by the loader chain's CSV sensor.
    #[must_use]
    pub fn sensor() -> Self {
        Self {
            interval_seconds: 5.0,
            timeout_seconds: 120.0,
        }
    }

    /// Creates bounds from explicit seconds.
    #[must_use]
    pub fn new(interval_seconds: f64, timeout_seconds: f64) -> Self {
        Self {
            interval_seconds,
            timeout_seconds,
        }
    }

    /// Gets the check interval as a Duration.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_seconds)
    }

    /// Gets the deadline as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Declarative metadata and retry policy for the scheduled task chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain owner, surfaced in logs and reports.
    #[serde(default = "default_owner")]
    pub owner: String,
    /// Schedule expression. The surrounding scheduler interprets it; the
    /// chain itself only records it.
    #[serde(default = "default_schedule")]
    pub schedule: String,
    /// Whether missed schedule ticks are re-run.
    #[serde(default)]
    pub catchup: bool,
    /// Notification recipients.
    #[serde(default)]
    pub email: Vec<String>,
    /// Whether a run failure should notify the recipients.
    #[serde(default)]
    pub email_on_failure: bool,
    /// Whether a task retry should notify the recipients.
    #[serde(default)]
    pub email_on_retry: bool,
    /// Automatic retries per task after the initial attempt.
    #[serde(default = "default_retries")]
    pub retries: usize,
    /// Seconds between retry attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
}

fn default_owner() -> String {
    "listingflow".to_string()
}

fn default_schedule() -> String {
    "@daily".to_string()
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay() -> f64 {
    15.0
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            schedule: default_schedule(),
            catchup: false,
            email: Vec::new(),
            email_on_failure: false,
            email_on_retry: false,
            retries: default_retries(),
            retry_delay_seconds: default_retry_delay(),
        }
    }
}

impl ChainConfig {
    /// Gets the retry delay as a Duration.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_seconds)
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the retry delay.
    #[must_use]
    pub fn with_retry_delay_seconds(mut self, seconds: f64) -> Self {
        self.retry_delay_seconds = seconds;
        self
    }
}

/// Combined configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Listings API call.
    #[serde(default)]
    pub api: ApiConfig,
    /// Directory the fetcher writes staging files into.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Bucket names.
    #[serde(default)]
    pub buckets: BucketConfig,
    /// Warehouse coordinates.
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Readability wait used by the event handlers.
    #[serde(default)]
    pub object_wait: WaitConfig,
    /// Poll bounds for the loader chain's CSV sensor.
    #[serde(default = "WaitConfig::sensor")]
    pub sensor: WaitConfig,
    /// Chain metadata and retry policy.
    #[serde(default)]
    pub chain: ChainConfig,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            staging_dir: default_staging_dir(),
            buckets: BucketConfig::default(),
            warehouse: WarehouseConfig::default(),
            object_wait: WaitConfig::default(),
            sensor: WaitConfig::sensor(),
            chain: ChainConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the staging directory.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }
}

/// Loads the API request header map from a local JSON config file.
///
/// The file is a flat string-to-string object, e.g.
/// `{"X-RapidAPI-Host": "...", "X-RapidAPI-Key": "..."}`.
pub fn load_api_credentials(path: &Path) -> Result<HashMap<String, String>, PipelineError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(format!(
            "cannot read credentials file '{}': {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        PipelineError::config(format!(
            "credentials file '{}' is not a flat JSON header map: {e}",
            path.display()
        ))
    })
}
