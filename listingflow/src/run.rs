//! Run identity and artifact naming.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline run.
///
/// The timestamp stamp (`ddMMyyyyHHmmss`) names the run's artifacts and makes
/// them unique across runs; the UUID correlates log lines. Re-running with
/// the same stamp overwrites the same artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Correlation id for this run.
    pub run_id: Uuid,
    /// The `ddMMyyyyHHmmss` stamp artifacts are named after.
    pub stamp: String,
}

impl RunIdentity {
    /// Creates an identity stamped with the current local time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(chrono::Local::now().naive_local())
    }

    /// Creates an identity stamped with a specific time.
    #[must_use]
    pub fn at(when: NaiveDateTime) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stamp: when.format("%d%m%Y%H%M%S").to_string(),
        }
    }

    /// Creates an identity with an explicit stamp.
    #[must_use]
    pub fn with_stamp(stamp: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stamp: stamp.into(),
        }
    }

    /// The staging file name for the raw API response.
    #[must_use]
    pub fn raw_file_name(&self) -> String {
        format!("response_data_{}.json", self.stamp)
    }

    /// The object name of the CSV derived from this run's raw file.
    #[must_use]
    pub fn csv_object_name(&self) -> String {
        format!("response_data_{}.csv", self.stamp)
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}
