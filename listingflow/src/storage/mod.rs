//! Object storage access.
//!
//! Every stage reaches the three buckets through a [`StoreSet`], a
//! bucket-name to [`ObjectStore`] registry. Production wiring builds one S3
//! backend per bucket; tests register in-memory stores under the same names.

pub mod wait;

use crate::config::BucketConfig;
use crate::errors::PipelineError;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Bucket-name to object-store registry.
#[derive(Debug, Default)]
pub struct StoreSet {
    stores: HashMap<String, Arc<dyn ObjectStore>>,
}

impl StoreSet {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store under a bucket name, replacing any previous entry.
    pub fn register(&mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) {
        self.stores.insert(bucket.into(), store);
    }

    /// Registers a store and returns the registry.
    #[must_use]
    pub fn with_store(mut self, bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        self.register(bucket, store);
        self
    }

    /// Checks whether a bucket is registered.
    #[must_use]
    pub fn contains(&self, bucket: &str) -> bool {
        self.stores.contains_key(bucket)
    }

    /// Resolves a bucket name to its store.
    ///
    /// # Errors
    ///
    /// Returns a config error for a bucket nothing was registered under.
    pub fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, PipelineError> {
        self.stores.get(bucket).cloned().ok_or_else(|| {
            PipelineError::config(format!("no object store registered for bucket '{bucket}'"))
        })
    }

    /// Builds an S3-backed registry covering every configured bucket.
    ///
    /// Region and credentials come from the environment, the way the AWS SDK
    /// reads them.
    pub fn s3(buckets: &BucketConfig) -> Result<Self, PipelineError> {
        let mut set = Self::new();
        for bucket in buckets.names() {
            if set.contains(bucket) {
                continue;
            }
            let store = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .build()
                .map_err(|e| PipelineError::transfer(bucket, e))?;
            info!(bucket, "object store: S3 backend");
            set.register(bucket, Arc::new(store));
        }
        Ok(set)
    }
}

/// Reads an object's full body.
pub async fn get_bytes(store: &dyn ObjectStore, key: &str) -> Result<Bytes, PipelineError> {
    let path = Path::from(key);
    let result = store
        .get(&path)
        .await
        .map_err(|e| PipelineError::transfer(key, e))?;
    result
        .bytes()
        .await
        .map_err(|e| PipelineError::transfer(key, e))
}

/// Writes an object, overwriting any existing body under the key.
pub async fn put_bytes(
    store: &dyn ObjectStore,
    key: &str,
    payload: Bytes,
) -> Result<(), PipelineError> {
    let path = Path::from(key);
    store
        .put(&path, payload.into())
        .await
        .map(|_| ())
        .map_err(|e| PipelineError::transfer(key, e))
}

/// Copies an object unmodified between stores under the identical key.
///
/// The write overwrites, so repeating the copy is safe.
pub async fn copy_between(
    source: &dyn ObjectStore,
    target: &dyn ObjectStore,
    key: &str,
) -> Result<(), PipelineError> {
    let payload = get_bytes(source, key).await?;
    put_bytes(target, key, payload).await
}
