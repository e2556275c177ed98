//! Record of one (action × message) execution.

use super::event_handler::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventExecutionStatus {
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl EventExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for EventExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Created on the first attempt and updated in place afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventExecution {
    /// `<message id>_<action index>`
    pub id: String,
    pub message_id: String,
    /// Handler name
    pub name: String,
    pub event: String,
    pub status: EventExecutionStatus,
    pub action: ActionKind,
    #[serde(default)]
    pub subject: Option<String>,
    pub received: DateTime<Utc>,
    #[serde(default)]
    pub accepted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output: Map<String, Value>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl EventExecution {
    pub fn new(
        message_id: &str,
        index: usize,
        handler_name: &str,
        event: &str,
        action: ActionKind,
    ) -> Self {
        Self {
            id: Self::execution_id(message_id, index),
            message_id: message_id.to_string(),
            name: handler_name.to_string(),
            event: event.to_string(),
            status: EventExecutionStatus::InProgress,
            action,
            subject: None,
            received: Utc::now(),
            accepted: None,
            started: None,
            processed: None,
            output: Map::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn execution_id(message_id: &str, index: usize) -> String {
        format!("{message_id}_{index}")
    }

    pub fn mark_started(&mut self) {
        self.started = Some(Utc::now());
    }

    /// Record a terminal status and the processed timestamp.
    pub fn finish(&mut self, status: EventExecutionStatus) {
        self.status = status;
        self.processed = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_id_combines_message_and_index() {
        let exec = EventExecution::new("msg-1", 2, "handler", "sqs:orders", ActionKind::FindUpdate);
        assert_eq!(exec.id, "msg-1_2");
        assert_eq!(exec.status, EventExecutionStatus::InProgress);
        assert!(exec.processed.is_none());
    }

    #[test]
    fn test_finish_stamps_processed() {
        let mut exec =
            EventExecution::new("msg-1", 0, "handler", "sqs:orders", ActionKind::UpdateTask);
        exec.finish(EventExecutionStatus::Failed);
        assert_eq!(exec.status, EventExecutionStatus::Failed);
        assert!(exec.processed.is_some());
    }
}
