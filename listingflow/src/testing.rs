//! Test doubles and fixtures.
//!
//! Shipped as a public module so downstream crates can exercise the stages
//! without a live API, object store, or warehouse.

use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::fetch::ListingsApi;
use crate::pipeline::Task;
use crate::storage::StoreSet;
use async_trait::async_trait;
use object_store::memory::InMemory;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// A listings API returning a fixed document and counting calls.
#[derive(Debug)]
pub struct StaticListingsApi {
    document: serde_json::Value,
    calls: Mutex<usize>,
}

impl StaticListingsApi {
    /// Creates an API that always returns `document`.
    #[must_use]
    pub fn new(document: serde_json::Value) -> Self {
        Self {
            document,
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of searches issued.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl ListingsApi for StaticListingsApi {
    async fn search(&self, _location: &str) -> Result<serde_json::Value, PipelineError> {
        *self.calls.lock() += 1;
        Ok(self.document.clone())
    }
}

/// A listings API whose response body never parses as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingListingsApi;

#[async_trait]
impl ListingsApi for FailingListingsApi {
    async fn search(&self, _location: &str) -> Result<serde_json::Value, PipelineError> {
        Err(PipelineError::malformed_response(
            "scripted failure: response body is not valid JSON",
        ))
    }
}

/// A chain task failing a configured number of times before succeeding.
#[derive(Debug)]
pub struct FlakyTask {
    task_id: String,
    remaining_failures: Mutex<usize>,
    calls: Mutex<usize>,
}

impl FlakyTask {
    /// Creates a task that fails `fail_times` times, then succeeds.
    ///
    /// Pass `usize::MAX` for a task that never succeeds.
    #[must_use]
    pub fn new(task_id: impl Into<String>, fail_times: usize) -> Self {
        Self {
            task_id: task_id.into(),
            remaining_failures: Mutex::new(fail_times),
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of executions so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Task for FlakyTask {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn execute(&self, _ctx: &RunContext) -> Result<(), PipelineError> {
        *self.calls.lock() += 1;
        let mut remaining = self.remaining_failures.lock();
        if *remaining > 0 {
            *remaining = remaining.saturating_sub(1);
            return Err(std::io::Error::other("scripted task failure").into());
        }
        Ok(())
    }
}

/// Builds a registry of in-memory stores, one per bucket name.
#[must_use]
pub fn memory_stores(buckets: &[&str]) -> StoreSet {
    let mut set = StoreSet::new();
    for bucket in buckets {
        set.register(*bucket, Arc::new(InMemory::new()) as Arc<dyn object_store::ObjectStore>);
    }
    set
}

/// A one-listing raw document carrying every projected field.
#[must_use]
pub fn sample_document() -> serde_json::Value {
    json!({
        "results": [{
            "bathrooms": 2,
            "bedrooms": 3,
            "city": "Houston",
            "country": "USA",
            "homeType": "SFR",
            "homeStatus": "FOR_SALE",
            "livingArea": 1500,
            "price": 300000,
            "rentZestimate": 2000,
            "zipcode": "77002",
            "latitude": 29.76,
            "longitude": -95.37,
            "taxAssessedValue": 290000,
            "isPremierBuilder": false
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::LISTING_COLUMNS;

    #[tokio::test]
    async fn test_static_api_counts_calls() {
        let api = StaticListingsApi::new(sample_document());
        api.search("houston, tx").await.unwrap();
        api.search("houston, tx").await.unwrap();
        assert_eq!(api.call_count(), 2);
    }

    #[test]
    fn test_sample_document_covers_every_column() {
        let document = sample_document();
        let record = document["results"][0].as_object().unwrap();
        for column in LISTING_COLUMNS {
            assert!(record.contains_key(column), "missing {column}");
        }
    }

    #[tokio::test]
    async fn test_flaky_task_recovers() {
        let task = FlakyTask::new("t", 1);
        let ctx = RunContext::new();
        assert!(task.execute(&ctx).await.is_err());
        assert!(task.execute(&ctx).await.is_ok());
        assert_eq!(task.call_count(), 2);
    }
}
