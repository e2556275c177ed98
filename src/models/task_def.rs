//! Task definition limits consulted by admission control.

use serde::{Deserialize, Serialize};

/// Admission-relevant subset of a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    /// Maximum tasks of this type IN_PROGRESS at once; zero or less is unlimited
    #[serde(default)]
    pub concurrency_limit: i32,
    #[serde(default)]
    pub rate_limit_per_frequency: i32,
    #[serde(default)]
    pub rate_limit_frequency_in_seconds: i32,
}

impl TaskDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency_limit: 0,
            rate_limit_per_frequency: 0,
            rate_limit_frequency_in_seconds: 0,
        }
    }

    pub fn with_concurrency_limit(mut self, limit: i32) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_rate_limit(mut self, per_frequency: i32, frequency_in_seconds: i32) -> Self {
        self.rate_limit_per_frequency = per_frequency;
        self.rate_limit_frequency_in_seconds = frequency_in_seconds;
        self
    }

    /// The concurrency limit, if one is in force.
    pub fn effective_concurrency_limit(&self) -> Option<i64> {
        (self.concurrency_limit > 0).then_some(i64::from(self.concurrency_limit))
    }

    /// `(limit, window_seconds)` when both are positive.
    pub fn effective_rate_limit(&self) -> Option<(i64, i64)> {
        if self.rate_limit_per_frequency > 0 && self.rate_limit_frequency_in_seconds > 0 {
            Some((
                i64::from(self.rate_limit_per_frequency),
                i64::from(self.rate_limit_frequency_in_seconds),
            ))
        } else {
            None
        }
    }
}
