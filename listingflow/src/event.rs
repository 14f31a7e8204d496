//! Storage notification decoding.
//!
//! Object-created notifications arrive as the store's own JSON shape
//! (`Records[0].s3.bucket.name` / `Records[0].s3.object.key`). Decoding
//! happens once at the trigger boundary and fails fast with a descriptive
//! error, so the handlers themselves only ever see a well-formed event.

use crate::errors::PipelineError;
use serde::{Deserialize, Serialize};

/// A decoded object-created notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    /// The bucket the object was created in.
    pub bucket: String,
    /// The created object's key.
    pub key: String,
}

impl StorageEvent {
    /// Creates an event from known coordinates.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Decodes a notification value into an event.
    ///
    /// Rejects notifications that do not match the expected shape, carry no
    /// records, or name an empty bucket or key.
    pub fn from_json(notification: &serde_json::Value) -> Result<Self, PipelineError> {
        let decoded: Notification = serde_json::from_value(notification.clone()).map_err(|e| {
            PipelineError::event_decode(format!(
                "notification does not match the Records[0].s3 shape: {e}"
            ))
        })?;

        let record = decoded
            .records
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::event_decode("notification carries no records"))?;

        let event = Self {
            bucket: record.s3.bucket.name,
            key: record.s3.object.key,
        };
        if event.bucket.is_empty() {
            return Err(PipelineError::event_decode("bucket name is empty"));
        }
        if event.key.is_empty() {
            return Err(PipelineError::event_decode("object key is empty"));
        }
        Ok(event)
    }

    /// Decodes a raw notification payload into an event.
    pub fn from_slice(payload: &[u8]) -> Result<Self, PipelineError> {
        let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            PipelineError::event_decode(format!("notification payload is not JSON: {e}"))
        })?;
        Self::from_json(&value)
    }
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records")]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketRecord,
    object: ObjectRecord,
}

#[derive(Debug, Deserialize)]
struct BucketRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRecord {
    key: String,
}
