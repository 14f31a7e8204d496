//! The four tasks of the daily loader chain.
//!
//! Extract fetches and stages the raw document, move uploads the staging
//! file into object storage, sense polls the cleaned bucket for the derived
//! CSV, and load bulk-copies it into the warehouse table. Results travel
//! between tasks only through the run context, keyed by the producing
//! task's id.

use crate::config::{PipelineConfig, WaitConfig};
use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::fetch::{FetchOutput, ListingFetcher, ListingsApi};
use crate::pipeline::{ChainSpec, Task, TaskChain};
use crate::run::RunIdentity;
use crate::storage::wait::wait_or_timeout;
use crate::storage::{put_bytes, StoreSet};
use crate::warehouse::{CopyOptions, Warehouse};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::info;

/// Run-context key the extract task publishes its result under.
pub const EXTRACT_TASK_ID: &str = "extract_listing_data";

const MOVE_TASK_ID: &str = "move_to_storage";
const SENSE_TASK_ID: &str = "csv_available_in_storage";
const LOAD_TASK_ID: &str = "transfer_to_warehouse";

/// Task A: fetch the listings document and stage it locally.
#[derive(Debug)]
pub struct ExtractTask {
    fetcher: ListingFetcher,
    run: RunIdentity,
}

impl ExtractTask {
    /// Creates the task for one run.
    #[must_use]
    pub fn new(fetcher: ListingFetcher, run: RunIdentity) -> Self {
        Self { fetcher, run }
    }
}

#[async_trait]
impl Task for ExtractTask {
    fn task_id(&self) -> &str {
        EXTRACT_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let output = self.fetcher.fetch(&self.run).await?;
        let value = serde_json::to_value(&output).map_err(std::io::Error::from)?;
        ctx.publish(EXTRACT_TASK_ID, value)?;
        Ok(())
    }
}

/// Task B: move the staging file into the landing bucket.
///
/// Move means create-at-destination then delete-from-source: the file bytes
/// are uploaded under the file's own name, then the local file is removed.
#[derive(Debug)]
pub struct MoveToStorageTask {
    stores: Arc<StoreSet>,
    landing_bucket: String,
}

impl MoveToStorageTask {
    /// Creates the task from the pipeline config.
    #[must_use]
    pub fn new(stores: Arc<StoreSet>, config: &PipelineConfig) -> Self {
        Self {
            stores,
            landing_bucket: config.buckets.landing.clone(),
        }
    }
}

#[async_trait]
impl Task for MoveToStorageTask {
    fn task_id(&self) -> &str {
        MOVE_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let output: FetchOutput = ctx.pull_typed(EXTRACT_TASK_ID)?;

        let file_name = output
            .staging_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "staging path '{}' has no file name",
                    output.staging_path.display()
                ))
            })?;

        let payload = tokio::fs::read(&output.staging_path).await?;
        let store = self.stores.resolve(&self.landing_bucket)?;
        put_bytes(store.as_ref(), file_name, Bytes::from(payload)).await?;
        tokio::fs::remove_file(&output.staging_path).await?;

        info!(
            file = file_name,
            bucket = %self.landing_bucket,
            "moved staging file into object storage"
        );
        Ok(())
    }
}

/// Task C: poll the cleaned bucket until the derived CSV appears.
#[derive(Debug)]
pub struct SenseCsvTask {
    stores: Arc<StoreSet>,
    cleaned_bucket: String,
    sensor: WaitConfig,
}

impl SenseCsvTask {
    /// Creates the task from the pipeline config.
    #[must_use]
    pub fn new(stores: Arc<StoreSet>, config: &PipelineConfig) -> Self {
        Self {
            stores,
            cleaned_bucket: config.buckets.cleaned.clone(),
            sensor: config.sensor.clone(),
        }
    }
}

#[async_trait]
impl Task for SenseCsvTask {
    fn task_id(&self) -> &str {
        SENSE_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let output: FetchOutput = ctx.pull_typed(EXTRACT_TASK_ID)?;

        wait_or_timeout(
            self.stores.resolve(&self.cleaned_bucket)?.as_ref(),
            &output.object_name,
            self.sensor.interval(),
            self.sensor.timeout(),
        )
        .await?;

        info!(
            key = %output.object_name,
            bucket = %self.cleaned_bucket,
            "cleaned csv available"
        );
        Ok(())
    }
}

/// Task D: bulk-load the cleaned CSV into the warehouse table, header
/// row skipped.
#[derive(Debug)]
pub struct WarehouseLoadTask {
    warehouse: Arc<dyn Warehouse>,
    cleaned_bucket: String,
    schema: String,
    table: String,
}

impl WarehouseLoadTask {
    /// Creates the task from the pipeline config.
    #[must_use]
    pub fn new(warehouse: Arc<dyn Warehouse>, config: &PipelineConfig) -> Self {
        Self {
            warehouse,
            cleaned_bucket: config.buckets.cleaned.clone(),
            schema: config.warehouse.schema.clone(),
            table: config.warehouse.table.clone(),
        }
    }
}

#[async_trait]
impl Task for WarehouseLoadTask {
    fn task_id(&self) -> &str {
        LOAD_TASK_ID
    }

    async fn execute(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        let output: FetchOutput = ctx.pull_typed(EXTRACT_TASK_ID)?;

        let loaded = self
            .warehouse
            .copy_from_object(
                &self.cleaned_bucket,
                &output.object_name,
                &self.schema,
                &self.table,
                &CopyOptions { skip_header: true },
            )
            .await?;

        info!(
            rows = loaded,
            table = %format!("{}.{}", self.schema, self.table),
            "bulk load complete"
        );
        Ok(())
    }
}

/// Assembles the daily chain: extract, move, sense, load.
#[must_use]
pub fn build_daily_chain(
    config: &PipelineConfig,
    api: Arc<dyn ListingsApi>,
    stores: Arc<StoreSet>,
    warehouse: Arc<dyn Warehouse>,
    run: RunIdentity,
) -> TaskChain {
    let spec = ChainSpec::from_config("listing_analytics", &config.chain);
    TaskChain::new(spec)
        .then(Arc::new(ExtractTask::new(
            ListingFetcher::new(api, config),
            run,
        )))
        .then(Arc::new(MoveToStorageTask::new(Arc::clone(&stores), config)))
        .then(Arc::new(SenseCsvTask::new(Arc::clone(&stores), config)))
        .then(Arc::new(WarehouseLoadTask::new(warehouse, config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::get_bytes;
    use crate::testing::{memory_stores, sample_document, StaticListingsApi};
    use crate::warehouse::MemoryWarehouse;
    use pretty_assertions::assert_eq;

    fn test_config(staging_dir: &std::path::Path) -> PipelineConfig {
        let mut config = PipelineConfig::default().with_staging_dir(staging_dir);
        config.sensor = WaitConfig::new(0.01, 0.05);
        config
    }

    async fn published_extract(ctx: &RunContext, staging_dir: &std::path::Path) -> FetchOutput {
        let output = FetchOutput {
            staging_path: staging_dir.join("response_data_01012024083000.json"),
            object_name: "response_data_01012024083000.csv".to_string(),
        };
        ctx.publish(
            EXTRACT_TASK_ID,
            serde_json::to_value(&output).unwrap(),
        )
        .unwrap();
        output
    }

    #[tokio::test]
    async fn test_extract_publishes_result() {
        let dir = tempfile::tempdir().unwrap();
        let task = ExtractTask::new(
            ListingFetcher::new(
                Arc::new(StaticListingsApi::new(sample_document())),
                &test_config(dir.path()),
            ),
            RunIdentity::with_stamp("01012024083000"),
        );
        let ctx = RunContext::new();

        task.execute(&ctx).await.unwrap();

        let output: FetchOutput = ctx.pull_typed(EXTRACT_TASK_ID).unwrap();
        assert_eq!(output.object_name, "response_data_01012024083000.csv");
        assert!(output.staging_path.exists());
    }

    #[tokio::test]
    async fn test_move_uploads_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new();
        let output = published_extract(&ctx, dir.path()).await;
        std::fs::write(&output.staging_path, b"{\"results\": []}").unwrap();

        let stores = Arc::new(memory_stores(&["raw-json-incoming"]));
        let task = MoveToStorageTask::new(stores.clone(), &test_config(dir.path()));
        task.execute(&ctx).await.unwrap();

        let landing = stores.resolve("raw-json-incoming").unwrap();
        let uploaded = get_bytes(landing.as_ref(), "response_data_01012024083000.json")
            .await
            .unwrap();
        assert_eq!(uploaded, Bytes::from_static(b"{\"results\": []}"));
        assert!(!output.staging_path.exists());
    }

    #[tokio::test]
    async fn test_move_without_extract_result() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Arc::new(memory_stores(&["raw-json-incoming"]));
        let task = MoveToStorageTask::new(stores, &test_config(dir.path()));

        let err = task.execute(&RunContext::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Context(_)));
    }

    #[tokio::test]
    async fn test_sense_times_out_when_csv_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new();
        published_extract(&ctx, dir.path()).await;

        let stores = Arc::new(memory_stores(&["cleaned-data-csv"]));
        let task = SenseCsvTask::new(stores, &test_config(dir.path()));

        let err = task.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_load_skips_header() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RunContext::new();
        published_extract(&ctx, dir.path()).await;

        let stores = Arc::new(memory_stores(&["cleaned-data-csv"]));
        let cleaned = stores.resolve("cleaned-data-csv").unwrap();
        put_bytes(
            cleaned.as_ref(),
            "response_data_01012024083000.csv",
            Bytes::from_static(b"col\nvalue\n"),
        )
        .await
        .unwrap();

        let warehouse = Arc::new(MemoryWarehouse::new(stores.clone()));
        let task = WarehouseLoadTask::new(warehouse.clone(), &test_config(dir.path()));
        task.execute(&ctx).await.unwrap();

        assert_eq!(
            warehouse.rows("PUBLIC", "listingdata"),
            vec![vec!["value".to_string()]]
        );
    }
}
