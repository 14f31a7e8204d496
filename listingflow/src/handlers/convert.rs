//! CSV conversion of incoming raw objects.

use crate::config::{PipelineConfig, WaitConfig};
use crate::errors::PipelineError;
use crate::event::StorageEvent;
use crate::handlers::{EventHandler, HandlerResponse};
use crate::storage::wait::wait_or_timeout;
use crate::storage::{get_bytes, put_bytes, StoreSet};
use crate::transform::{derived_csv_key, listings_to_csv};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

/// Parses each incoming raw document and writes its 14-column CSV into the
/// cleaned-data bucket under the derived key.
///
/// Writes overwrite, so the handler is idempotent at the destination key.
#[derive(Debug)]
pub struct CsvConversionHandler {
    stores: Arc<StoreSet>,
    cleaned_bucket: String,
    wait: WaitConfig,
}

impl CsvConversionHandler {
    /// Creates the handler from the pipeline config.
    #[must_use]
    pub fn new(stores: Arc<StoreSet>, config: &PipelineConfig) -> Self {
        Self {
            stores,
            cleaned_bucket: config.buckets.cleaned.clone(),
            wait: config.object_wait.clone(),
        }
    }
}

#[async_trait]
impl EventHandler for CsvConversionHandler {
    fn name(&self) -> &str {
        "csv_conversion"
    }

    async fn handle(&self, event: &StorageEvent) -> Result<HandlerResponse, PipelineError> {
        let target_key = derived_csv_key(&event.key);
        debug!(key = %event.key, target_key = %target_key, "deriving cleaned object name");

        let source = self.stores.resolve(&event.bucket)?;
        wait_or_timeout(
            source.as_ref(),
            &event.key,
            self.wait.interval(),
            self.wait.timeout(),
        )
        .await?;

        let payload = get_bytes(source.as_ref(), &event.key).await?;
        let text = std::str::from_utf8(&payload)
            .map_err(|e| PipelineError::malformed_response(format!("object body is not UTF-8: {e}")))?;
        let document: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            PipelineError::malformed_response(format!("object body is not valid JSON: {e}"))
        })?;

        let csv = listings_to_csv(&document)?;

        let cleaned = self.stores.resolve(&self.cleaned_bucket)?;
        put_bytes(cleaned.as_ref(), &target_key, Bytes::from(csv)).await?;
        info!(
            key = %target_key,
            bucket = %self.cleaned_bucket,
            "wrote cleaned csv"
        );

        Ok(HandlerResponse::ok(
            "csv conversion and upload to storage complete",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::put_bytes;
    use crate::testing::{memory_stores, sample_document};
    use crate::transform::LISTING_COLUMNS;
    use pretty_assertions::assert_eq;

    fn handler(stores: Arc<StoreSet>) -> CsvConversionHandler {
        let mut config = PipelineConfig::default();
        config.object_wait = WaitConfig::new(0.01, 0.05);
        CsvConversionHandler::new(stores, &config)
    }

    async fn put_document(stores: &StoreSet, key: &str, document: &serde_json::Value) {
        let incoming = stores.resolve("raw-json-incoming").unwrap();
        put_bytes(
            incoming.as_ref(),
            key,
            Bytes::from(serde_json::to_vec(document).unwrap()),
        )
        .await
        .unwrap();
    }

    async fn cleaned_text(stores: &StoreSet, key: &str) -> String {
        let cleaned = stores.resolve("cleaned-data-csv").unwrap();
        let payload = get_bytes(cleaned.as_ref(), key).await.unwrap();
        String::from_utf8(payload.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_converts_document_to_csv() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "cleaned-data-csv"]));
        put_document(&stores, "listing_20240101.json", &sample_document()).await;

        let response = handler(stores.clone())
            .handle(&StorageEvent::new("raw-json-incoming", "listing_20240101.json"))
            .await
            .unwrap();
        assert_eq!(response.status_code, 200);

        let csv = cleaned_text(&stores, "listing_20240101.csv").await;
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], LISTING_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "2,3,Houston,USA,SFR,FOR_SALE,1500,300000,2000,77002,29.76,-95.37,290000,false"
        );
    }

    #[tokio::test]
    async fn test_missing_results_writes_nothing() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "cleaned-data-csv"]));
        put_document(
            &stores,
            "bad.json",
            &serde_json::json!({"totalResultCount": 0}),
        )
        .await;

        let err = handler(stores.clone())
            .handle(&StorageEvent::new("raw-json-incoming", "bad.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingField { .. }));

        let cleaned = stores.resolve("cleaned-data-csv").unwrap();
        let missing = get_bytes(cleaned.as_ref(), "bad.csv").await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "cleaned-data-csv"]));
        let incoming = stores.resolve("raw-json-incoming").unwrap();
        put_bytes(
            incoming.as_ref(),
            "garbage.json",
            Bytes::from_static(b"<html>not json</html>"),
        )
        .await
        .unwrap();

        let err = handler(stores)
            .handle(&StorageEvent::new("raw-json-incoming", "garbage.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_suffix_strip_is_unvalidated() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "cleaned-data-csv"]));
        put_document(&stores, "listing_20240101.jsn", &sample_document()).await;

        handler(stores.clone())
            .handle(&StorageEvent::new("raw-json-incoming", "listing_20240101.jsn"))
            .await
            .unwrap();

        // Five characters stripped regardless of the actual extension.
        let csv = cleaned_text(&stores, "listing_2024010.csv").await;
        assert!(csv.starts_with("bathrooms,"));
    }

    #[tokio::test]
    async fn test_rewrites_same_destination_key() {
        let stores = Arc::new(memory_stores(&["raw-json-incoming", "cleaned-data-csv"]));
        put_document(&stores, "doc.json", &sample_document()).await;

        let handler = handler(stores.clone());
        let event = StorageEvent::new("raw-json-incoming", "doc.json");
        handler.handle(&event).await.unwrap();
        let first = cleaned_text(&stores, "doc.csv").await;
        handler.handle(&event).await.unwrap();
        let second = cleaned_text(&stores, "doc.csv").await;

        assert_eq!(first, second);
    }
}
