//! Error types for the listingflow pipeline.
//!
//! One taxonomy covers every stage. No stage catches and recovers from these:
//! each failure propagates to the invoking task chain or event router, which
//! applies its own retry or redelivery policy.

use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The API response or object body is not valid JSON (or not UTF-8 text).
    #[error("malformed response: {reason}")]
    MalformedResponse {
        /// What failed to parse.
        reason: String,
    },

    /// A required field is absent from the listing document.
    #[error("missing field '{field}' in listing document")]
    MissingField {
        /// The absent field name.
        field: String,
    },

    /// A projected column is absent from every record in the batch.
    #[error("missing column '{column}' in projected table")]
    MissingColumn {
        /// The absent column name.
        column: String,
    },

    /// A bounded wait or poll exceeded its deadline.
    #[error("timed out after {waited_secs}s waiting for '{subject}'")]
    Timeout {
        /// What was being waited for.
        subject: String,
        /// The deadline that elapsed, in seconds.
        waited_secs: f64,
    },

    /// The object store rejected a get/put/copy/delete call.
    #[error("transfer failed for '{key}': {source}")]
    Transfer {
        /// The object key involved.
        key: String,
        /// The underlying store error.
        #[source]
        source: object_store::Error,
    },

    /// A storage notification could not be decoded at the trigger boundary.
    #[error("event decode error: {reason}")]
    EventDecode {
        /// Why the notification was rejected.
        reason: String,
    },

    /// A run-context conflict, missing key, or decode failure.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A configuration or credential-file problem.
    #[error("config error: {reason}")]
    Config {
        /// What is misconfigured.
        reason: String,
    },

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The warehouse rejected a connection or bulk-copy statement.
    #[error("warehouse error: {reason}")]
    Warehouse {
        /// The rejection reason.
        reason: String,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a malformed-response error.
    #[must_use]
    pub fn malformed_response(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Creates a missing-field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a missing-column error.
    #[must_use]
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Creates a timeout error for an expired wait bound.
    #[must_use]
    pub fn timeout(subject: impl Into<String>, waited: std::time::Duration) -> Self {
        Self::Timeout {
            subject: subject.into(),
            waited_secs: waited.as_secs_f64(),
        }
    }

    /// Creates a transfer error wrapping a store rejection.
    #[must_use]
    pub fn transfer(key: impl Into<String>, source: object_store::Error) -> Self {
        Self::Transfer {
            key: key.into(),
            source,
        }
    }

    /// Creates an event-decode error.
    #[must_use]
    pub fn event_decode(reason: impl Into<String>) -> Self {
        Self::EventDecode {
            reason: reason.into(),
        }
    }

    /// Creates a config error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a warehouse error.
    #[must_use]
    pub fn warehouse(reason: impl Into<String>) -> Self {
        Self::Warehouse {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the run-scoped task result channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A second publish to an already-populated key.
    #[error("run-context conflict: key '{key}' already exists")]
    Conflict {
        /// The conflicting key.
        key: String,
    },

    /// A pull from a key no upstream task has published.
    #[error("run-context key '{key}' not found")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// A published value did not decode into the expected shape.
    #[error("run-context value for '{key}' failed to decode: {reason}")]
    Decode {
        /// The key whose value was malformed.
        key: String,
        /// The decode failure.
        reason: String,
    },
}

impl ContextError {
    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(key: impl Into<String>) -> Self {
        Self::Conflict { key: key.into() }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
