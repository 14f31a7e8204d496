//! Run-scoped task result handoff.
//!
//! Tasks in the loader chain communicate only through this channel: a task
//! publishes its result under its own id, and downstream tasks pull it. A key
//! is insert-once, so a re-published result surfaces as a conflict instead of
//! silently replacing what a downstream task already read.

use crate::errors::ContextError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// The key/value channel shared by one chain run.
#[derive(Debug, Default)]
pub struct RunContext {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a value under a key.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Conflict` if the key already exists.
    pub fn publish(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), ContextError> {
        let key = key.into();
        let mut data = self.data.write();

        if data.contains_key(&key) {
            return Err(ContextError::conflict(key));
        }

        data.insert(key, value);
        Ok(())
    }

    /// Pulls the value published under a key.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::NotFound` if nothing was published there.
    pub fn pull(&self, key: &str) -> Result<serde_json::Value, ContextError> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| ContextError::not_found(key))
    }

    /// Pulls and decodes the value published under a key.
    pub fn pull_typed<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContextError> {
        let value = self.pull(key)?;
        serde_json::from_value(value).map_err(|e| ContextError::decode(key, e.to_string()))
    }

    /// Gets a value without an error on absence.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Checks if a key has been published.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Returns all published keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Returns the number of published entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_publish_and_pull() {
        let ctx = RunContext::new();
        ctx.publish("extract", json!(["path", "name.csv"])).unwrap();

        assert_eq!(ctx.pull("extract").unwrap(), json!(["path", "name.csv"]));
        assert!(ctx.contains_key("extract"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_double_publish_conflicts() {
        let ctx = RunContext::new();
        ctx.publish("extract", json!(1)).unwrap();

        let err = ctx.publish("extract", json!(2)).unwrap_err();
        assert_eq!(err, ContextError::conflict("extract"));
        assert_eq!(ctx.pull("extract").unwrap(), json!(1));
    }

    #[test]
    fn test_pull_missing_key() {
        let ctx = RunContext::new();
        let err = ctx.pull("nothing").unwrap_err();
        assert_eq!(err, ContextError::not_found("nothing"));
    }

    #[test]
    fn test_pull_typed() {
        let ctx = RunContext::new();
        ctx.publish("pair", json!({"a": 1, "b": 2})).unwrap();

        let decoded: HashMap<String, u32> = ctx.pull_typed("pair").unwrap();
        assert_eq!(decoded["a"], 1);

        let err = ctx.pull_typed::<Vec<String>>("pair").unwrap_err();
        assert!(matches!(err, ContextError::Decode { .. }));
    }
}
