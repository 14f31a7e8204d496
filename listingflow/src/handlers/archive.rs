//! Archival copy of incoming raw objects.

use crate::config::{PipelineConfig, WaitConfig};
use crate::errors::PipelineError;
use crate::event::StorageEvent;
use crate::handlers::{EventHandler, HandlerResponse};
use crate::storage::wait::wait_or_timeout;
use crate::storage::{copy_between, StoreSet};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Copies every incoming raw object, unmodified, into the archival bucket
/// under the identical key.
///
/// The write overwrites, so redelivery of the same event re-copies the same
/// bytes and is safe.
#[derive(Debug)]
pub struct RawCopyHandler {
    stores: Arc<StoreSet>,
    archival_bucket: String,
    wait: WaitConfig,
}

impl RawCopyHandler {
    /// Creates the handler from the pipeline config.
    #[must_use]
    pub fn new(stores: Arc<StoreSet>, config: &PipelineConfig) -> Self {
        Self {
            stores,
            archival_bucket: config.buckets.archival.clone(),
            wait: config.object_wait.clone(),
        }
    }
}

#[async_trait]
impl EventHandler for RawCopyHandler {
    fn name(&self) -> &str {
        "raw_copy"
    }

    async fn handle(&self, event: &StorageEvent) -> Result<HandlerResponse, PipelineError> {
        let source = self.stores.resolve(&event.bucket)?;
        let target = self.stores.resolve(&self.archival_bucket)?;

        wait_or_timeout(
            source.as_ref(),
            &event.key,
            self.wait.interval(),
            self.wait.timeout(),
        )
        .await?;

        copy_between(source.as_ref(), target.as_ref(), &event.key).await?;
        info!(
            key = %event.key,
            from = %event.bucket,
            to = %self.archival_bucket,
            "archived raw object"
        );

        Ok(HandlerResponse::ok("copy completed successfully"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{get_bytes, put_bytes};
    use crate::testing::memory_stores;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    fn handler(stores: Arc<StoreSet>) -> RawCopyHandler {
        let mut config = PipelineConfig::default();
        config.object_wait = WaitConfig::new(0.01, 0.05);
        RawCopyHandler::new(stores, &config)
    }

    #[tokio::test]
    async fn test_copies_object_verbatim() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "raw-json-archive"]));
        let incoming = stores.resolve("raw-json-incoming").unwrap();
        let body = Bytes::from_static(b"{\"results\": []}");
        put_bytes(incoming.as_ref(), "doc.json", body.clone())
            .await
            .unwrap();

        let response = handler(stores.clone())
            .handle(&StorageEvent::new("raw-json-incoming", "doc.json"))
            .await
            .unwrap();

        assert_eq!(response, HandlerResponse::ok("copy completed successfully"));
        let archive = stores.resolve("raw-json-archive").unwrap();
        assert_eq!(get_bytes(archive.as_ref(), "doc.json").await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_repeat_event_is_idempotent() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "raw-json-archive"]));
        let incoming = stores.resolve("raw-json-incoming").unwrap();
        let body = Bytes::from_static(b"{\"results\": [1]}");
        put_bytes(incoming.as_ref(), "doc.json", body.clone())
            .await
            .unwrap();

        let handler = handler(stores.clone());
        let event = StorageEvent::new("raw-json-incoming", "doc.json");
        handler.handle(&event).await.unwrap();
        handler.handle(&event).await.unwrap();

        let archive = stores.resolve("raw-json-archive").unwrap();
        assert_eq!(get_bytes(archive.as_ref(), "doc.json").await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_wait_timeout_propagates() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "raw-json-archive"]));

        let err = handler(stores)
            .handle(&StorageEvent::new("raw-json-incoming", "never.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unregistered_source_bucket() {
        let stores = Arc::new(memory_stores(&["raw-json-archive"]));

        let err = handler(stores)
            .handle(&StorageEvent::new("unknown-bucket", "doc.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }
}
