//! Event-invoked pipeline stages.
//!
//! The archival copy and the CSV conversion both fire on the same
//! object-created notification. The router decodes the notification once and
//! dispatches the event to every registered handler concurrently; the
//! handlers are independent and carry no ordering guarantee relative to each
//! other or to the scheduled loader chain.

mod archive;
mod convert;

pub use archive::RawCopyHandler;
pub use convert::CsvConversionHandler;

use crate::errors::PipelineError;
use crate::event::StorageEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// The status pair an event handler invocation returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Human-readable completion message.
    pub body: String,
}

impl HandlerResponse {
    /// Creates a 200 response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }
}

/// Trait for stages invoked directly by storage events.
#[async_trait]
pub trait EventHandler: Send + Sync + fmt::Debug {
    /// Returns the handler's name, used in logs and dispatch results.
    fn name(&self) -> &str;

    /// Handles one decoded storage event.
    async fn handle(&self, event: &StorageEvent) -> Result<HandlerResponse, PipelineError>;
}

/// Dispatches one storage event to every registered handler.
#[derive(Debug, Default)]
pub struct EventRouter {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Registers a handler and returns the router.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Runs every handler against the event concurrently.
    ///
    /// Each handler's outcome is reported under its name; one handler
    /// failing does not stop the others. Failures are logged here and left
    /// to the event source's redelivery policy.
    pub async fn dispatch(
        &self,
        event: &StorageEvent,
    ) -> Vec<(String, Result<HandlerResponse, PipelineError>)> {
        let invocations = self.handlers.iter().map(|handler| async move {
            let outcome = handler.handle(event).await;
            if let Err(ref e) = outcome {
                error!(handler = handler.name(), error = %e, "event handler failed");
            }
            (handler.name().to_string(), outcome)
        });
        futures::future::join_all(invocations).await
    }

    /// Decodes a raw notification and dispatches the event.
    pub async fn dispatch_json(
        &self,
        notification: &serde_json::Value,
    ) -> Result<Vec<(String, Result<HandlerResponse, PipelineError>)>, PipelineError> {
        let event = StorageEvent::from_json(notification)?;
        Ok(self.dispatch(&event).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct RecordingHandler {
        name: String,
        seen: Mutex<Vec<StorageEvent>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(name: &str, fail: bool) -> Self {
            Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, event: &StorageEvent) -> Result<HandlerResponse, PipelineError> {
            self.seen.lock().push(event.clone());
            if self.fail {
                Err(PipelineError::missing_field("results"))
            } else {
                Ok(HandlerResponse::ok("done"))
            }
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_every_handler() {
        let first = Arc::new(RecordingHandler::new("first", false));
        let second = Arc::new(RecordingHandler::new("second", false));
        let router = EventRouter::new()
            .with_handler(first.clone() as Arc<dyn EventHandler>)
            .with_handler(second.clone() as Arc<dyn EventHandler>);

        let event = StorageEvent::new("raw-json-incoming", "doc.json");
        let results = router.dispatch(&event).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, outcome)| outcome.is_ok()));
        assert_eq!(first.seen.lock().as_slice(), &[event.clone()]);
        assert_eq!(second.seen.lock().as_slice(), &[event]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_other() {
        let failing = Arc::new(RecordingHandler::new("failing", true));
        let healthy = Arc::new(RecordingHandler::new("healthy", false));
        let router = EventRouter::new()
            .with_handler(failing as Arc<dyn EventHandler>)
            .with_handler(healthy.clone() as Arc<dyn EventHandler>);

        let results = router
            .dispatch(&StorageEvent::new("raw-json-incoming", "doc.json"))
            .await;

        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
        assert_eq!(healthy.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_json_rejects_bad_notification() {
        let router = EventRouter::new();
        let err = router
            .dispatch_json(&serde_json::json!({"bad": "shape"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EventDecode { .. }));
    }
}
