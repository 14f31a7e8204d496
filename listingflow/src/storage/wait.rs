//! Bounded wait for object existence.
//!
//! Object creation and readability are not atomic with the notification that
//! announces them, so every consumer polls until the object's metadata is
//! servable. The bound is explicit: the caller picks the interval and the
//! deadline and gets a [`WaitOutcome`] back instead of an unbounded block.

use crate::errors::PipelineError;
use object_store::path::Path;
use object_store::ObjectStore;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// The result of a bounded existence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The object exists and is readable.
    Found,
    /// The deadline elapsed without the object appearing.
    TimedOut,
}

/// Polls a store until the key exists or the deadline elapses.
///
/// The first check happens immediately; later checks are `interval` apart.
/// A store rejection other than not-found propagates as a transfer error.
pub async fn wait_for_object(
    store: &dyn ObjectStore,
    key: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<WaitOutcome, PipelineError> {
    let path = Path::from(key);
    let deadline = Instant::now() + timeout;

    loop {
        match store.head(&path).await {
            Ok(_) => return Ok(WaitOutcome::Found),
            Err(object_store::Error::NotFound { .. }) => {
                debug!(key, "object not present yet");
            }
            Err(e) => return Err(PipelineError::transfer(key, e)),
        }

        if Instant::now() + interval > deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Waits for the key, converting an expired bound into a timeout error.
pub async fn wait_or_timeout(
    store: &dyn ObjectStore,
    key: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<(), PipelineError> {
    match wait_for_object(store, key, interval, timeout).await? {
        WaitOutcome::Found => Ok(()),
        WaitOutcome::TimedOut => Err(PipelineError::timeout(key, timeout)),
    }
}
